//! `V*` settings commands.
//!
//! `VS` updates move feeds (slots 0..4) and jog speeds (slots 5..9); jog
//! updates are also pushed into the driver's velocity maxima like `JS`.
//! `VC` updates cutter geometry. `VU` recalculates per-motor travel from
//! the requested steps-per-unit: it reads the motor's step angle and
//! microstep setting, derives the travel-per-revolution that yields the
//! requested resolution, and writes it back — a full driver round trip.

use super::{move_jog, Args, HandlerCx, HandlerError, HandlerFailure};
use core_config::SpeedAxis;
use tracing::debug;

const SPEED_GROUPS: [SpeedAxis; 5] = [
    SpeedAxis::Xy,
    SpeedAxis::Z,
    SpeedAxis::A,
    SpeedAxis::B,
    SpeedAxis::C,
];

pub(super) fn set_speeds(cx: &mut HandlerCx<'_>, args: &Args) -> Result<(), HandlerFailure> {
    for (index, group) in SPEED_GROUPS.into_iter().enumerate() {
        if let Some(v) = args.num(index)? {
            cx.settings.set_move_speed(group, v);
        }
    }
    for (index, group) in SPEED_GROUPS.into_iter().enumerate() {
        if let Some(v) = args.num(index + 5)? {
            cx.settings.set_jog_speed(group, v);
            move_jog::push_jog_vm(cx, group, v)?;
        }
    }
    Ok(())
}

pub(super) fn set_cutter(cx: &mut HandlerCx<'_>, args: &Args) -> Result<(), HandlerFailure> {
    if let Some(v) = args.num(0)? {
        cx.settings.cutter_dia = v;
    }
    if let Some(v) = args.num(1)? {
        cx.settings.pocket_overlap = v;
    }
    if let Some(v) = args.num(2)? {
        cx.settings.safe_z_pull_up = v;
    }
    if let Some(v) = args.num(3)? {
        cx.settings.safe_a_pull_up = v;
    }
    if let Some(v) = args.num(4)? {
        cx.settings.plunge_dir = v;
    }
    debug!(target: "interp", cutter_dia = cx.settings.cutter_dia, "cutter_values_updated");
    Ok(())
}

pub(super) fn recalc_units(cx: &mut HandlerCx<'_>, args: &Args) -> Result<(), HandlerFailure> {
    for motor in 1..=6usize {
        let Some(units) = args.num(motor - 1)? else {
            continue;
        };
        if units <= 0.0 {
            return Err(HandlerError::Argument {
                mnemonic: "VU".into(),
                index: motor - 1,
                detail: "steps-per-unit must be positive".into(),
            }
            .into());
        }
        let sa = cx
            .driver
            .get(&format!("{motor}sa"))
            .map_err(HandlerFailure::driver)?;
        let mi = cx
            .driver
            .get(&format!("{motor}mi"))
            .map_err(HandlerFailure::driver)?;
        if sa <= 0.0 {
            return Err(HandlerError::Invalid {
                mnemonic: "VU".into(),
                detail: format!("motor {motor} reports a nonpositive step angle"),
            }
            .into());
        }
        let previous = cx
            .driver
            .get(&format!("{motor}tr"))
            .map_err(HandlerFailure::driver)?;
        // steps/unit = (360 / sa) * mi / tr  =>  tr = (360 / sa) * mi / units
        let travel = (360.0 / sa) * mi / units;
        cx.driver
            .set(&format!("{motor}tr"), travel)
            .map_err(HandlerFailure::driver)?;
        debug!(target: "interp", motor, units, previous, travel, "unit_recalculated");
    }
    Ok(())
}
