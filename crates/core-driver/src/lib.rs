//! Motion-driver abstraction and the simulator backend.
//!
//! The physical motor controller is a black box behind the `Driver` trait:
//! the runtime submits newline-joined G-code segments, reads and writes named
//! driver parameters, and blocks on reported state transitions. Status
//! reports (axis positions plus the segment-relative line counter) arrive on
//! a `crossbeam-channel` receiver handed out by `subscribe_status`; dropping
//! the receiver is the disconnect.

use anyhow::Result;
use crossbeam_channel::Receiver;

pub mod sim;
pub use sim::SimDriver;

/// Driver-reported execution states. `Other` covers anything the runtime
/// does not recognize; waits treat it like motion still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Running,
    Homing,
    Probe,
    Stop,
    Other,
}

impl DriverState {
    pub fn is_stop(self) -> bool {
        matches!(self, DriverState::Stop)
    }
}

/// One incoming status payload. Every field is optional; the status mirror
/// copies only what is present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusReport {
    pub state: Option<DriverState>,
    pub posx: Option<f64>,
    pub posy: Option<f64>,
    pub posz: Option<f64>,
    pub posa: Option<f64>,
    pub posb: Option<f64>,
    pub posc: Option<f64>,
    /// Line counter relative to the currently executing segment. The status
    /// mirror projects it back onto the source program.
    pub line: Option<usize>,
}

/// Contract the runtime requires from a motion controller.
///
/// `run_segment` is a non-blocking submission; completion is observed through
/// `wait_state_change` returning `Stop`. Parameter writes are fire-and-forget
/// at the protocol level, so `set` returning `Ok` only means the write was
/// accepted for delivery.
pub trait Driver {
    /// Submit a newline-joined G-code segment for execution.
    fn run_segment(&mut self, text: &str) -> Result<()>;

    /// Read a named driver parameter (e.g. `mpox`, `1sa`, `1tr`).
    fn get(&mut self, key: &str) -> Result<f64>;

    /// Read several parameters in submission order.
    fn get_many(&mut self, keys: &[String]) -> Result<Vec<f64>> {
        keys.iter().map(|k| self.get(k)).collect()
    }

    /// Write a named driver parameter.
    fn set(&mut self, key: &str, value: f64) -> Result<()>;

    /// Block until the driver reports its next state transition.
    fn wait_state_change(&mut self) -> Result<DriverState>;

    /// Hand out the status event stream. Dropping the receiver unsubscribes.
    fn subscribe_status(&mut self) -> Receiver<StatusReport>;
}
