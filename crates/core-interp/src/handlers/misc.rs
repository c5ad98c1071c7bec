//! Probe, spindle shortcuts, and coordinate-mode commands.

use super::{Args, HandlerCx, HandlerFailure};
use crate::gcode::num;

/// `EP`: straight probe toward the given Z depth. Runs as its own segment
/// (the engine flushed the chunk before calling us) and blocks until the
/// driver reports the probe cycle stopped.
pub(super) fn probe(cx: &mut HandlerCx<'_>, args: &Args) -> Result<(), HandlerFailure> {
    let depth = args.require(0)?;
    cx.driver
        .run_segment(&format!("G38.2 Z{}", num(depth)))
        .map_err(HandlerFailure::driver)?;
    loop {
        let state = cx
            .driver
            .wait_state_change()
            .map_err(HandlerFailure::driver)?;
        if state.is_stop() {
            break;
        }
    }
    Ok(())
}

/// `C6`: spindle on with coolant.
pub(super) fn spindle_on(cx: &mut HandlerCx<'_>) -> Result<(), HandlerFailure> {
    cx.chunk.emit("M3".to_string());
    cx.chunk.emit("M8".to_string());
    Ok(())
}

/// `C7`: coolant off, spindle off.
pub(super) fn spindle_off(cx: &mut HandlerCx<'_>) -> Result<(), HandlerFailure> {
    cx.chunk.emit("M9".to_string());
    cx.chunk.emit("M5".to_string());
    Ok(())
}

/// `SA`: absolute distance mode.
pub(super) fn absolute_mode(cx: &mut HandlerCx<'_>) -> Result<(), HandlerFailure> {
    cx.chunk.emit("G90".to_string());
    Ok(())
}

/// `SR`: relative distance mode.
pub(super) fn relative_mode(cx: &mut HandlerCx<'_>) -> Result<(), HandlerFailure> {
    cx.chunk.emit("G91".to_string());
    Ok(())
}

/// `ST`: primary (table-base) work coordinate system.
pub(super) fn table_base(cx: &mut HandlerCx<'_>) -> Result<(), HandlerFailure> {
    cx.chunk.emit("G54".to_string());
    Ok(())
}
