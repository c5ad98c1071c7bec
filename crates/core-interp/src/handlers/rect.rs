//! `CR` — cut rectangle/pocket.
//!
//! Argument layout: lenX, lenY, I/O/T, direction, start corner (1..4, 0 for
//! centered), plunge depth, repetitions, option (1 outline, 2 pocket
//! outside-in, 3 pocket inside-out), plungeFromZero, rotation angle
//! (degrees, clockwise positive), plunge axis (0 = Z, 1 = A), spiral plunge.
//!
//! Cutter compensation shifts both side lengths by one cutter diameter.
//! Every emitted XY is rotated about the rectangle start point. A spiral
//! plunge distributes the pass depth across the four vertices of the first
//! ring (quarter, half, three-quarter, full). Each pass lifts to the safe
//! height and rapids back to the start while further repetitions remain.

use super::{Args, HandlerCx, HandlerError, HandlerFailure};
use crate::gcode::{feed, num};
use core_config::SpeedAxis;
use core_geometry::rotate_xy;

const EPS: f64 = 1e-9;

pub(super) fn cut_rect(cx: &mut HandlerCx<'_>, args: &Args) -> Result<(), HandlerFailure> {
    let len_x = args.require(0)?;
    let len_y = args.require(1)?;
    let comp = args.letter_or(2, 'T');
    let clockwise = args.num_or(3, 1.0)? == 1.0;
    let st_corner = args.num_or(4, 1.0)? as i64;
    let plunge = args.num_or(5, 0.0)?;
    let reps = args.num_or(6, 1.0)?.max(1.0) as u32;
    let option = match args.num_or(7, 1.0)? as i64 {
        o @ 1..=3 => o,
        _ => 1,
    };
    let plunge_from_zero = args.flag(8)?;
    let angle = args.num_or(9, 0.0)?;
    let plunge_axis = args.num_or(10, 0.0)? as i64;
    let spiral = args.flag(11)?;

    let delta = match comp {
        'I' => -cx.settings.cutter_dia,
        'O' => cx.settings.cutter_dia,
        _ => 0.0,
    };
    let dx = len_x + delta;
    let dy = len_y + delta;
    if dx <= EPS || dy <= EPS {
        return Err(HandlerError::Invalid {
            mnemonic: "CR".into(),
            detail: "cutter compensation leaves no rectangle to cut".into(),
        }
        .into());
    }

    let start_x = cx.pos.x;
    let start_y = cx.pos.y;

    // Absolute position of corner 1, chosen so the current position is the
    // requested start corner (or the center).
    let origin = match st_corner {
        0 => (start_x - dx / 2.0, start_y - dy / 2.0),
        2 => (start_x, start_y - dy),
        3 => (start_x - dx, start_y - dy),
        4 => (start_x - dx, start_y),
        _ => (start_x, start_y),
    };
    let start_corner = if (1..=4).contains(&st_corner) {
        st_corner as usize
    } else {
        1
    };

    // Plunge axis selection: Z by default, A for rotary indexing.
    let (plunge_letter, plunge_group, safe) = if plunge_axis == 1 {
        ('A', SpeedAxis::A, cx.settings.safe_a_pull_up)
    } else {
        ('Z', SpeedAxis::Z, cx.settings.safe_z_pull_up)
    };
    let plunge_feed = cx.settings.move_speed(plunge_group);
    let xy_feed = cx.settings.movexy_speed;
    let base = if plunge_from_zero {
        0.0
    } else {
        plunge_pos(cx, plunge_axis)
    };

    let insets: Vec<f64> = match option {
        1 => vec![0.0],
        _ => {
            let step = cx.settings.pocket_step();
            if step <= 0.0 {
                return Err(HandlerError::Invalid {
                    mnemonic: "CR".into(),
                    detail: "pocket step-over is not positive".into(),
                }
                .into());
            }
            let n = ((dx.min(dy) / 2.0) / step).floor() as usize + 1;
            let mut v: Vec<f64> = (0..n).map(|k| k as f64 * step).collect();
            if option == 3 {
                v.reverse();
            }
            v
        }
    };

    for rep in 1..=reps {
        let target = base - plunge * rep as f64;
        let spiral_this_rep = spiral && rep == 1 && plunge != 0.0;
        if plunge != 0.0 && !spiral_this_rep {
            cx.chunk.emit(format!(
                "G1{plunge_letter}{} F{}",
                num(target),
                feed(plunge_feed)
            ));
            set_plunge_pos(cx, plunge_axis, target);
        }
        for (ring_no, inset) in insets.iter().enumerate() {
            let pts = ring_path(origin, dx, dy, *inset, clockwise, start_corner);
            // Position onto the ring start when not already there.
            let (rx0, ry0) = rotate_xy(pts[0].0, pts[0].1, angle, start_x, start_y);
            if (cx.pos.x - rx0).abs() > EPS || (cx.pos.y - ry0).abs() > EPS {
                cx.chunk
                    .emit(format!("G1X{}Y{} F{}", num(rx0), num(ry0), feed(xy_feed)));
                cx.pos.x = rx0;
                cx.pos.y = ry0;
            }
            for (i, pt) in pts.iter().enumerate().skip(1) {
                let (rx, ry) = rotate_xy(pt.0, pt.1, angle, start_x, start_y);
                if spiral_this_rep && ring_no == 0 {
                    let zv = base - plunge * (rep - 1) as f64 - plunge * i as f64 / 4.0;
                    cx.chunk.emit(format!(
                        "G1X{}Y{}{plunge_letter}{} F{}",
                        num(rx),
                        num(ry),
                        num(zv),
                        feed(xy_feed)
                    ));
                    set_plunge_pos(cx, plunge_axis, zv);
                } else {
                    cx.chunk
                        .emit(format!("G1X{}Y{} F{}", num(rx), num(ry), feed(xy_feed)));
                }
                cx.pos.x = rx;
                cx.pos.y = ry;
            }
        }
        if rep < reps {
            cx.chunk
                .emit(format!("G0{plunge_letter}{}", num(safe)));
            set_plunge_pos(cx, plunge_axis, safe);
            cx.chunk
                .emit(format!("G0X{}Y{}", num(start_x), num(start_y)));
            cx.pos.x = start_x;
            cx.pos.y = start_y;
        }
    }
    Ok(())
}

fn plunge_pos(cx: &HandlerCx<'_>, plunge_axis: i64) -> f64 {
    if plunge_axis == 1 {
        cx.pos.a
    } else {
        cx.pos.z
    }
}

fn set_plunge_pos(cx: &mut HandlerCx<'_>, plunge_axis: i64, v: f64) {
    if plunge_axis == 1 {
        cx.pos.a = v;
    } else {
        cx.pos.z = v;
    }
}

/// Closed 5-point corner path of one rectangle ring, honoring direction and
/// the requested start corner. Corner 1 is the origin corner; 2 is up the Y
/// side, 3 the far corner, 4 along the X side.
fn ring_path(
    origin: (f64, f64),
    dx: f64,
    dy: f64,
    inset: f64,
    clockwise: bool,
    start_corner: usize,
) -> Vec<(f64, f64)> {
    let corner = |k: usize| -> (f64, f64) {
        match k {
            1 => (inset, inset),
            2 => (inset, dy - inset),
            3 => (dx - inset, dy - inset),
            _ => (dx - inset, inset),
        }
    };
    let cycle: [usize; 4] = if clockwise { [1, 2, 3, 4] } else { [1, 4, 3, 2] };
    let p = cycle
        .iter()
        .position(|&k| k == start_corner)
        .unwrap_or(0);
    (0..=4)
        .map(|i| {
            let (rx, ry) = corner(cycle[(p + i) % 4]);
            (origin.0 + rx, origin.1 + ry)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_path_closes_on_start_corner() {
        let pts = ring_path((0.0, 0.0), 2.0, 1.0, 0.0, true, 1);
        assert_eq!(pts.len(), 5);
        assert_eq!(pts[0], pts[4]);
        assert_eq!(pts[0], (0.0, 0.0));
        assert_eq!(pts[1], (0.0, 1.0));
        assert_eq!(pts[2], (2.0, 1.0));
        assert_eq!(pts[3], (2.0, 0.0));
    }

    #[test]
    fn counter_clockwise_reverses_visit_order() {
        let cw = ring_path((0.0, 0.0), 2.0, 1.0, 0.0, true, 1);
        let ccw = ring_path((0.0, 0.0), 2.0, 1.0, 0.0, false, 1);
        assert_eq!(ccw[1], cw[3]);
        assert_eq!(ccw[3], cw[1]);
    }

    #[test]
    fn start_corner_permutes_cycle() {
        let pts = ring_path((0.0, 0.0), 2.0, 1.0, 0.0, true, 3);
        assert_eq!(pts[0], (2.0, 1.0));
        assert_eq!(pts[4], (2.0, 1.0));
        // Direction is preserved: from corner 3 clockwise goes to corner 4.
        assert_eq!(pts[1], (2.0, 0.0));
    }

    #[test]
    fn inset_shrinks_ring_symmetrically() {
        let pts = ring_path((0.0, 0.0), 4.0, 2.0, 0.5, true, 1);
        assert_eq!(pts[0], (0.5, 0.5));
        assert_eq!(pts[2], (3.5, 1.5));
    }
}
