//! Move (G1) and jog (G0) families plus speed-setting commands.
//!
//! Single-axis moves emit `G1<axis><target> F<feed>` at the axis-appropriate
//! feed; modal moves emit one `G1` carrying only the axis words that were
//! supplied. Jogs are rapids and carry no feed word. `MS`/`JS` update the
//! runtime speed record; `JS` additionally pushes per-axis velocity maxima
//! into the driver, a fire-and-forget write that does not pause execution.

use super::{Args, HandlerCx, HandlerFailure};
use crate::gcode;
use crate::Axis;
use core_config::SpeedAxis;

const SPEED_GROUPS: [SpeedAxis; 5] = [
    SpeedAxis::Xy,
    SpeedAxis::Z,
    SpeedAxis::A,
    SpeedAxis::B,
    SpeedAxis::C,
];

pub(super) fn single_move(
    cx: &mut HandlerCx<'_>,
    axis: Axis,
    args: &Args,
) -> Result<(), HandlerFailure> {
    let target = args.require(0)?;
    let speed = cx.settings.move_speed(axis.speed_group());
    cx.chunk.emit(format!(
        "G1{}{} F{}",
        axis.letter(),
        gcode::num(target),
        gcode::feed(speed)
    ));
    cx.pos.set(axis, target);
    Ok(())
}

pub(super) fn modal_move(
    cx: &mut HandlerCx<'_>,
    axes: &[Axis],
    args: &Args,
) -> Result<(), HandlerFailure> {
    let mut line = String::from("G1");
    for (index, axis) in axes.iter().enumerate() {
        if let Some(target) = args.num(index)? {
            line.push(axis.letter());
            line.push_str(&gcode::num(target));
            cx.pos.set(*axis, target);
        }
    }
    // Omitted axes emit no words; the feed always closes the line.
    line.push('F');
    line.push_str(&gcode::feed(cx.settings.movexy_speed));
    cx.chunk.emit(line);
    Ok(())
}

pub(super) fn single_jog(
    cx: &mut HandlerCx<'_>,
    axis: Axis,
    args: &Args,
) -> Result<(), HandlerFailure> {
    let target = args.require(0)?;
    cx.chunk
        .emit(format!("G0{}{}", axis.letter(), gcode::num(target)));
    cx.pos.set(axis, target);
    Ok(())
}

pub(super) fn modal_jog(
    cx: &mut HandlerCx<'_>,
    axes: &[Axis],
    args: &Args,
) -> Result<(), HandlerFailure> {
    let mut line = String::from("G0");
    for (index, axis) in axes.iter().enumerate() {
        if let Some(target) = args.num(index)? {
            line.push(axis.letter());
            line.push_str(&gcode::num(target));
            cx.pos.set(*axis, target);
        }
    }
    cx.chunk.emit(line);
    Ok(())
}

/// `MH`/`JH`: rapid to the XY origin.
pub(super) fn home(cx: &mut HandlerCx<'_>) -> Result<(), HandlerFailure> {
    cx.chunk.emit("G0X0Y0".to_string());
    cx.pos.x = 0.0;
    cx.pos.y = 0.0;
    Ok(())
}

pub(super) fn set_move_speeds(cx: &mut HandlerCx<'_>, args: &Args) -> Result<(), HandlerFailure> {
    for (index, group) in SPEED_GROUPS.into_iter().enumerate() {
        if let Some(v) = args.num(index)? {
            cx.settings.set_move_speed(group, v);
        }
    }
    Ok(())
}

pub(super) fn set_jog_speeds(cx: &mut HandlerCx<'_>, args: &Args) -> Result<(), HandlerFailure> {
    for (index, group) in SPEED_GROUPS.into_iter().enumerate() {
        if let Some(v) = args.num(index)? {
            cx.settings.set_jog_speed(group, v);
            push_jog_vm(cx, group, v)?;
        }
    }
    Ok(())
}

/// Push a jog speed into the driver's per-axis velocity maxima, in
/// units/minute. The XY group fans out to both axes.
pub(super) fn push_jog_vm(
    cx: &mut HandlerCx<'_>,
    group: SpeedAxis,
    speed: f64,
) -> Result<(), HandlerFailure> {
    let vm = speed * 60.0;
    let keys: &[&str] = match group {
        SpeedAxis::Xy => &["xvm", "yvm"],
        SpeedAxis::Z => &["zvm"],
        SpeedAxis::A => &["avm"],
        SpeedAxis::B => &["bvm"],
        SpeedAxis::C => &["cvm"],
    };
    for key in keys {
        cx.driver.set(key, vm).map_err(HandlerFailure::driver)?;
    }
    Ok(())
}
