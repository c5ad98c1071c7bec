//! Command handler dispatch.
//!
//! One handler per OpenSBP mnemonic, decomposed into focused sub-modules:
//! * `move_jog` - feed moves, rapid jogs, speed updates
//! * `circle`   - CG arc/circle synthesis (plunge, pocket, spiral)
//! * `rect`     - CR rectangle outline and pocket synthesis
//! * `zero`     - work-coordinate zeroing and VA location writes
//! * `values`   - V* settings commands
//! * `misc`     - probe, spindle shortcuts, coordinate modes
//!
//! Handlers receive already-evaluated argument values with positional
//! defaults applied by the accessors on `Args`. Non-breaking handlers only
//! append to the chunk and mutate commanded position or settings; breaking
//! handlers additionally perform driver round trips (the engine has flushed
//! the chunk before calling them). An unknown mnemonic logs and continues,
//! preserving legacy file compatibility.

use crate::chunk::ChunkBuffer;
use crate::eval::Value;
use crate::{Axis, AxisPos};
use core_config::DriveSettings;
use core_driver::Driver;
use core_program::Mnemonic;
use thiserror::Error;
use tracing::{debug, warn};

mod circle;
mod misc;
mod move_jog;
mod rect;
mod values;
mod zero;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HandlerError {
    #[error("{mnemonic}: missing required argument {index}")]
    Missing { mnemonic: String, index: usize },
    #[error("{mnemonic}: argument {index}: {detail}")]
    Argument {
        mnemonic: String,
        index: usize,
        detail: String,
    },
    #[error("{mnemonic}: {detail}")]
    Invalid { mnemonic: String, detail: String },
}

/// Handler-level failure, wrapped with a source line by the engine.
#[derive(Debug)]
pub(crate) enum HandlerFailure {
    Command(HandlerError),
    Driver(String),
}

impl HandlerFailure {
    pub(crate) fn driver(e: anyhow::Error) -> Self {
        HandlerFailure::Driver(format!("{e:#}"))
    }

    pub(crate) fn at_line(self, line: usize) -> crate::RuntimeError {
        match self {
            HandlerFailure::Command(source) => crate::RuntimeError::Command { line, source },
            HandlerFailure::Driver(message) => crate::RuntimeError::Driver { line, message },
        }
    }
}

impl From<HandlerError> for HandlerFailure {
    fn from(e: HandlerError) -> Self {
        HandlerFailure::Command(e)
    }
}

/// Mutable slice of runtime state a handler may touch.
pub(crate) struct HandlerCx<'a> {
    pub chunk: &'a mut ChunkBuffer,
    pub pos: &'a mut AxisPos,
    pub settings: &'a mut DriveSettings,
    pub driver: &'a mut dyn Driver,
}

/// Evaluated positional arguments with default-aware accessors.
pub(crate) struct Args {
    mnemonic: Mnemonic,
    values: Vec<Option<Value>>,
}

impl Args {
    pub fn new(mnemonic: Mnemonic, values: Vec<Option<Value>>) -> Self {
        Self { mnemonic, values }
    }

    fn slot(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(|v| v.as_ref())
    }

    /// Numeric value of slot `index`, or `None` when the slot is empty.
    pub fn num(&self, index: usize) -> Result<Option<f64>, HandlerError> {
        match self.slot(index) {
            None => Ok(None),
            Some(v) => v
                .as_number()
                .map(Some)
                .map_err(|e| HandlerError::Argument {
                    mnemonic: self.mnemonic.as_str().to_string(),
                    index,
                    detail: e.to_string(),
                }),
        }
    }

    /// Numeric value of slot `index` with a positional default.
    pub fn num_or(&self, index: usize, default: f64) -> Result<f64, HandlerError> {
        Ok(self.num(index)?.unwrap_or(default))
    }

    /// Numeric value of slot `index`; empty is an error.
    pub fn require(&self, index: usize) -> Result<f64, HandlerError> {
        self.num(index)?.ok_or_else(|| HandlerError::Missing {
            mnemonic: self.mnemonic.as_str().to_string(),
            index,
        })
    }

    /// Flag slot: defaults to false, any nonzero value is true.
    pub fn flag(&self, index: usize) -> Result<bool, HandlerError> {
        Ok(self.num_or(index, 0.0)? != 0.0)
    }

    /// Letter-valued slot (cutter compensation `I`/`O`/`T`), uppercased.
    /// Numeric or empty slots take the default.
    pub fn letter_or(&self, index: usize, default: char) -> char {
        match self.slot(index) {
            Some(Value::Str(s)) => s
                .trim()
                .chars()
                .next()
                .map(|c| c.to_ascii_uppercase())
                .unwrap_or(default),
            _ => default,
        }
    }
}

pub(crate) fn execute(
    cx: &mut HandlerCx<'_>,
    mnemonic: Mnemonic,
    args: &Args,
) -> Result<(), HandlerFailure> {
    match mnemonic.as_str() {
        // Single-axis feed moves
        "MX" => move_jog::single_move(cx, Axis::X, args),
        "MY" => move_jog::single_move(cx, Axis::Y, args),
        "MZ" => move_jog::single_move(cx, Axis::Z, args),
        "MA" => move_jog::single_move(cx, Axis::A, args),
        "MB" => move_jog::single_move(cx, Axis::B, args),
        "MC" => move_jog::single_move(cx, Axis::C, args),
        // Modal feed moves
        "M2" => move_jog::modal_move(cx, &Axis::ALL[..2], args),
        "M3" => move_jog::modal_move(cx, &Axis::ALL[..3], args),
        "M4" => move_jog::modal_move(cx, &Axis::ALL[..4], args),
        "M5" => move_jog::modal_move(cx, &Axis::ALL[..5], args),
        "M6" => move_jog::modal_move(cx, &Axis::ALL[..6], args),
        "MH" => move_jog::home(cx),
        "MS" => move_jog::set_move_speeds(cx, args),
        // Single-axis rapids
        "JX" => move_jog::single_jog(cx, Axis::X, args),
        "JY" => move_jog::single_jog(cx, Axis::Y, args),
        "JZ" => move_jog::single_jog(cx, Axis::Z, args),
        "JA" => move_jog::single_jog(cx, Axis::A, args),
        "JB" => move_jog::single_jog(cx, Axis::B, args),
        "JC" => move_jog::single_jog(cx, Axis::C, args),
        // Modal rapids
        "J2" => move_jog::modal_jog(cx, &Axis::ALL[..2], args),
        "J3" => move_jog::modal_jog(cx, &Axis::ALL[..3], args),
        "J4" => move_jog::modal_jog(cx, &Axis::ALL[..4], args),
        "J5" => move_jog::modal_jog(cx, &Axis::ALL[..5], args),
        "J6" => move_jog::modal_jog(cx, &Axis::ALL[..6], args),
        "JH" => move_jog::home(cx),
        "JS" => move_jog::set_jog_speeds(cx, args),
        // Toolpath synthesis
        "CG" => circle::cut_circle(cx, args),
        "CR" => rect::cut_rect(cx, args),
        // Work-coordinate zeroing (breaking)
        "ZX" => zero::zero_axes(cx, &[Axis::X]),
        "ZY" => zero::zero_axes(cx, &[Axis::Y]),
        "ZZ" => zero::zero_axes(cx, &[Axis::Z]),
        "ZA" => zero::zero_axes(cx, &[Axis::A]),
        "ZB" => zero::zero_axes(cx, &[Axis::B]),
        "ZC" => zero::zero_axes(cx, &[Axis::C]),
        "Z2" => zero::zero_axes(cx, &Axis::ALL[..2]),
        "Z3" => zero::zero_axes(cx, &Axis::ALL[..3]),
        "Z4" => zero::zero_axes(cx, &Axis::ALL[..4]),
        "Z5" => zero::zero_axes(cx, &Axis::ALL[..5]),
        "Z6" => zero::zero_axes(cx, &Axis::ALL[..6]),
        "ZT" => zero::zero_axes(cx, &Axis::ALL),
        // Settings
        "VA" => zero::set_location(cx, args),
        "VC" => values::set_cutter(cx, args),
        "VS" => values::set_speeds(cx, args),
        "VU" => values::recalc_units(cx, args),
        "VD" | "VL" | "VN" | "VP" | "VR" => {
            // Accepted for legacy compatibility; no effect.
            debug!(target: "interp", mnemonic = %mnemonic, "settings_command_ignored");
            Ok(())
        }
        // Probe and fixed sequences
        "EP" => misc::probe(cx, args),
        "C6" => misc::spindle_on(cx),
        "C7" => misc::spindle_off(cx),
        "SA" => misc::absolute_mode(cx),
        "SR" => misc::relative_mode(cx),
        "ST" => misc::table_base(cx),
        _ => {
            warn!(target: "interp", mnemonic = %mnemonic, "unhandled_command");
            Ok(())
        }
    }
}
