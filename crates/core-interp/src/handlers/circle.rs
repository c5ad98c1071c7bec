//! `CG` — cut circle/arc.
//!
//! Argument layout (the leading legacy diameter slot is accepted and
//! ignored): diameter, endX, endY, centerXoffset, centerYoffset, I/O/T,
//! direction, plunge depth, repetitions, propX, propY, option, noPullUp,
//! plungeFromZero.
//!
//! Options: 1 = arc/circle with per-pass plunge, 2 = concentric pocket from
//! the outside in, 3 = spiral plunge over one revolution, 4 = spiral plunge
//! plus a flat finishing pass at the bottom. The spiral arc words use `I`/`K`
//! exactly as the legacy emitter did; the flat passes use `I`/`J`.

use super::{Args, HandlerCx, HandlerError, HandlerFailure};
use crate::gcode::{feed, num};

const EPS: f64 = 1e-9;

pub(super) fn cut_circle(cx: &mut HandlerCx<'_>, args: &Args) -> Result<(), HandlerFailure> {
    let start_x = cx.pos.x;
    let start_y = cx.pos.y;
    let start_z = cx.pos.z;

    let end_x = args.num_or(1, start_x)?;
    let end_y = args.num_or(2, start_y)?;
    let off_x = args.num_or(3, 0.0)?;
    let off_y = args.num_or(4, 0.0)?;
    let comp = args.letter_or(5, 'T');
    let clockwise = args.num_or(6, 1.0)? == 1.0;
    let plunge = args.num_or(7, 0.0)?;
    let reps = args.num_or(8, 1.0)?.max(1.0) as u32;
    let prop_x = args.num_or(9, 1.0)?;
    let prop_y = args.num_or(10, 1.0)?;
    let option = match args.num_or(11, 1.0)? as i64 {
        o @ 1..=4 => o,
        _ => 1,
    };
    let no_pull_up = args.flag(12)?;
    let plunge_from_zero = args.flag(13)?;

    let arc = if clockwise { "G2" } else { "G3" };
    let xy_feed = cx.settings.movexy_speed;
    let z_feed = cx.settings.movez_speed;
    let safe_z = cx.settings.safe_z_pull_up;

    // Proportion scaling stretches the geometry about the start point.
    let mut i_off = off_x * prop_x;
    let mut j_off = off_y * prop_y;
    let mut end = (
        start_x + (end_x - start_x) * prop_x,
        start_y + (end_y - start_y) * prop_y,
    );

    // Cutter compensation scales the circle about the start point: inside
    // shrinks the radius by a tool radius, outside grows it.
    let radius = (i_off * i_off + j_off * j_off).sqrt();
    let comp_scale = match comp {
        'I' if radius > EPS => (radius - cx.settings.cutter_dia / 2.0) / radius,
        'O' if radius > EPS => (radius + cx.settings.cutter_dia / 2.0) / radius,
        _ => 1.0,
    };
    if comp_scale != 1.0 {
        let old_center = (start_x + i_off, start_y + j_off);
        i_off *= comp_scale;
        j_off *= comp_scale;
        let new_center = (start_x + i_off, start_y + j_off);
        end = (
            new_center.0 + (end.0 - old_center.0) * comp_scale,
            new_center.1 + (end.1 - old_center.1) * comp_scale,
        );
    }

    let full_circle = (end.0 - start_x).abs() < EPS && (end.1 - start_y).abs() < EPS;
    let base_z = if plunge_from_zero { 0.0 } else { start_z };

    match option {
        2 => {
            let step = cx.settings.pocket_step();
            let outer = (i_off * i_off + j_off * j_off).sqrt();
            if outer <= EPS {
                return Err(HandlerError::Invalid {
                    mnemonic: "CG".into(),
                    detail: "pocket requires a nonzero center offset".into(),
                }
                .into());
            }
            if step <= 0.0 {
                return Err(HandlerError::Invalid {
                    mnemonic: "CG".into(),
                    detail: "pocket step-over is not positive".into(),
                }
                .into());
            }
            // Each ring starts on the ray from the center through the start
            // point, stepping inward by the pocket step-over.
            let center = (start_x + i_off, start_y + j_off);
            let ux = -i_off / outer;
            let uy = -j_off / outer;
            for rep in 1..=reps {
                if plunge != 0.0 {
                    let z = base_z - plunge * rep as f64;
                    cx.chunk.emit(format!("G1Z{} F{}", num(z), feed(z_feed)));
                    cx.pos.z = z;
                }
                let mut r = outer;
                let mut first = true;
                while r > EPS {
                    let sx = center.0 + ux * r;
                    let sy = center.1 + uy * r;
                    if !first {
                        cx.chunk
                            .emit(format!("G1X{}Y{} F{}", num(sx), num(sy), feed(xy_feed)));
                    }
                    cx.chunk.emit(format!(
                        "{arc}X{}Y{}I{}J{} F{}",
                        num(sx),
                        num(sy),
                        num(center.0 - sx),
                        num(center.1 - sy),
                        feed(xy_feed)
                    ));
                    cx.pos.x = sx;
                    cx.pos.y = sy;
                    first = false;
                    r -= step;
                }
                if rep < reps {
                    retract_and_return(cx, start_x, start_y, safe_z);
                }
            }
        }
        3 | 4 => {
            for rep in 1..=reps {
                let z = base_z - plunge * rep as f64;
                cx.chunk.emit(format!(
                    "{arc}X{}Y{}Z{}I{}K{} F{}",
                    num(end.0),
                    num(end.1),
                    num(z),
                    num(i_off),
                    num(j_off),
                    feed(xy_feed)
                ));
                cx.pos.x = end.0;
                cx.pos.y = end.1;
                cx.pos.z = z;
                if option == 4 {
                    cx.chunk.emit(format!(
                        "{arc}X{}Y{}I{}J{} F{}",
                        num(end.0),
                        num(end.1),
                        num(i_off),
                        num(j_off),
                        feed(xy_feed)
                    ));
                }
                if rep < reps && !full_circle {
                    retract_and_return(cx, start_x, start_y, safe_z);
                }
            }
        }
        _ => {
            for rep in 1..=reps {
                if plunge != 0.0 {
                    let z = base_z - plunge * rep as f64;
                    cx.chunk.emit(format!("G1Z{} F{}", num(z), feed(z_feed)));
                    cx.pos.z = z;
                }
                cx.chunk.emit(format!(
                    "{arc}X{}Y{}I{}J{} F{}",
                    num(end.0),
                    num(end.1),
                    num(i_off),
                    num(j_off),
                    feed(xy_feed)
                ));
                cx.pos.x = end.0;
                cx.pos.y = end.1;
                if rep < reps && !full_circle {
                    retract_and_return(cx, start_x, start_y, safe_z);
                }
            }
        }
    }

    if !no_pull_up && (cx.pos.z - start_z).abs() > EPS {
        cx.chunk.emit(format!("G0Z{}", num(start_z)));
        cx.pos.z = start_z;
    }
    Ok(())
}

/// Lift to safe Z, rapid back to the pass start.
fn retract_and_return(cx: &mut HandlerCx<'_>, x: f64, y: f64, safe_z: f64) {
    cx.chunk.emit(format!("G0Z{}", num(safe_z)));
    cx.chunk.emit(format!("G0X{}Y{}", num(x), num(y)));
    cx.pos.z = safe_z;
    cx.pos.x = x;
    cx.pos.y = y;
}
