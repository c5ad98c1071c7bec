//! Work-coordinate zeroing (`ZX`..`ZC`, `Z2`..`Z6`, `ZT`) and the `VA`
//! location write.
//!
//! All of these are stack breakers: the engine has flushed the chunk and
//! waited out in-flight motion before they run, so the machine positions
//! read here are settled. Zeroing reads the machine-coordinate position of
//! each axis (`mpo*`) and writes it as the secondary work offset with a
//! combined `G10 L2 P2`, making the current position the new origin. `VA`
//! generalizes this: the offset is chosen so the current position reads as
//! the requested value.

use super::{Args, HandlerCx, HandlerFailure};
use crate::gcode::num;
use crate::Axis;

pub(super) fn zero_axes(cx: &mut HandlerCx<'_>, axes: &[Axis]) -> Result<(), HandlerFailure> {
    let mut words = String::new();
    for axis in axes {
        let key = format!("mpo{}", axis.lower());
        let mpo = cx.driver.get(&key).map_err(HandlerFailure::driver)?;
        words.push_str(&format!(" {}{}", axis.letter(), num(mpo)));
        cx.pos.set(*axis, 0.0);
    }
    cx.chunk.emit(format!("G10 L2 P2{words}"));
    Ok(())
}

pub(super) fn set_location(cx: &mut HandlerCx<'_>, args: &Args) -> Result<(), HandlerFailure> {
    let mut words = String::new();
    for (index, axis) in Axis::ALL.into_iter().enumerate() {
        if let Some(target) = args.num(index)? {
            let key = format!("mpo{}", axis.lower());
            let mpo = cx.driver.get(&key).map_err(HandlerFailure::driver)?;
            words.push_str(&format!(" {}{}", axis.letter(), num(mpo - target)));
            cx.pos.set(axis, target);
        }
    }
    if !words.is_empty() {
        cx.chunk.emit(format!("G10 L2 P2{words}"));
    }
    Ok(())
}
