//! Status mirror: the runtime's local copy of driver-reported state.
//!
//! Incoming reports are merged field-wise; only keys present in the payload
//! are copied. The driver's `line` counter is relative to the segment it is
//! executing, so the mirror projects it back onto the source program by
//! adding the chunk's starting statement index. The machine-level execution
//! state is owned by the runtime and never copied from the driver.

use core_driver::StatusReport;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MachineState {
    #[default]
    Idle,
    Running,
    Manual,
    Paused,
    Stopped,
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MachineState::Idle => "idle",
            MachineState::Running => "running",
            MachineState::Manual => "manual",
            MachineState::Paused => "paused",
            MachineState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MachineStatus {
    pub state: MachineState,
    pub posx: f64,
    pub posy: f64,
    pub posz: f64,
    pub posa: f64,
    pub posb: f64,
    pub posc: f64,
    /// 1-based source program line most recently reported executing.
    pub line: Option<usize>,
    pub nb_lines: Option<usize>,
    pub filename: Option<String>,
    pub current_file: Option<String>,
}

impl MachineStatus {
    /// Merge a driver report. `chunk_start` is the statement index at which
    /// the currently executing chunk began.
    pub fn merge_report(&mut self, report: &StatusReport, chunk_start: usize) {
        if let Some(v) = report.posx {
            self.posx = v;
        }
        if let Some(v) = report.posy {
            self.posy = v;
        }
        if let Some(v) = report.posz {
            self.posz = v;
        }
        if let Some(v) = report.posa {
            self.posa = v;
        }
        if let Some(v) = report.posb {
            self.posb = v;
        }
        if let Some(v) = report.posc {
            self.posc = v;
        }
        if let Some(line) = report.line {
            self.line = Some(chunk_start + line);
        }
    }

    /// Clear file-scoped fields on program end or abort.
    pub fn clear_file_fields(&mut self) {
        self.line = None;
        self.nb_lines = None;
        self.filename = None;
        self.current_file = None;
    }
}
