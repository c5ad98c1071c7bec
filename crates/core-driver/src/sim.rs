//! In-process driver simulator.
//!
//! Records every submitted segment, answers parameter reads from a prefilled
//! table, and synthesizes the `running -> stop` transition pair for each
//! segment so the engine's flush protocol runs exactly as it would against
//! real hardware. Used by the binary's dry-run mode and the integration
//! tests.

use crate::{Driver, DriverState, StatusReport};
use anyhow::{bail, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::HashMap;
use tracing::debug;

pub struct SimDriver {
    params: HashMap<String, f64>,
    segments: Vec<String>,
    /// Transitions queued by `run_segment`, drained by `wait_state_change`.
    transitions: Vec<DriverState>,
    status_tx: Sender<StatusReport>,
    status_rx: Receiver<StatusReport>,
    /// Echo each accepted segment to stdout (dry-run display).
    echo: bool,
}

impl Default for SimDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SimDriver {
    pub fn new() -> Self {
        let (status_tx, status_rx) = unbounded();
        let mut params = HashMap::new();
        for axis in ["x", "y", "z", "a", "b", "c"] {
            params.insert(format!("mpo{axis}"), 0.0);
        }
        // Motor table defaults: 1.8 deg/step, 8 microsteps, 0.25 units/rev.
        for motor in 1..=6 {
            params.insert(format!("{motor}sa"), 1.8);
            params.insert(format!("{motor}mi"), 8.0);
            params.insert(format!("{motor}tr"), 0.25);
        }
        Self {
            params,
            segments: Vec::new(),
            transitions: Vec::new(),
            status_tx,
            status_rx,
            echo: false,
        }
    }

    pub fn with_echo() -> Self {
        let mut sim = Self::new();
        sim.echo = true;
        sim
    }

    /// Segments accepted so far, in submission order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Every G-code line shipped, flattened across segments.
    pub fn gcode_lines(&self) -> Vec<String> {
        self.segments
            .iter()
            .flat_map(|s| s.lines().map(str::to_string))
            .collect()
    }

    /// Seed a parameter (e.g. a machine position for a zeroing test).
    pub fn set_param(&mut self, key: &str, value: f64) {
        self.params.insert(key.to_string(), value);
    }

    /// Queue a status report as if the controller had published one.
    pub fn push_status(&self, report: StatusReport) {
        let _ = self.status_tx.send(report);
    }
}

impl Driver for SimDriver {
    fn run_segment(&mut self, text: &str) -> Result<()> {
        debug!(target: "driver.sim", lines = text.lines().count(), "segment_accepted");
        if self.echo {
            println!("{text}");
        }
        let line_count = text.lines().count();
        self.segments.push(text.to_string());
        // The controller reports running, executes, then reports stop with
        // the segment-relative line counter at its last line.
        self.transitions.push(DriverState::Stop);
        self.transitions.push(DriverState::Running);
        let _ = self.status_tx.send(StatusReport {
            state: Some(DriverState::Stop),
            line: Some(line_count),
            ..StatusReport::default()
        });
        Ok(())
    }

    fn get(&mut self, key: &str) -> Result<f64> {
        match self.params.get(key) {
            Some(v) => Ok(*v),
            None => bail!("unknown driver parameter: {key}"),
        }
    }

    fn set(&mut self, key: &str, value: f64) -> Result<()> {
        self.params.insert(key.to_string(), value);
        Ok(())
    }

    fn wait_state_change(&mut self) -> Result<DriverState> {
        // Never blocks: a segment's transitions are synthesized eagerly, and
        // with nothing in flight the controller is already stopped.
        Ok(self.transitions.pop().unwrap_or(DriverState::Stop))
    }

    fn subscribe_status(&mut self) -> Receiver<StatusReport> {
        self.status_rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_produces_running_then_stop() {
        let mut sim = SimDriver::new();
        sim.run_segment("G1X1 F60\nG1X2 F60").unwrap();
        assert_eq!(sim.wait_state_change().unwrap(), DriverState::Running);
        assert_eq!(sim.wait_state_change().unwrap(), DriverState::Stop);
        assert_eq!(sim.segments().len(), 1);
        assert_eq!(sim.gcode_lines(), vec!["G1X1 F60", "G1X2 F60"]);
    }

    #[test]
    fn idle_wait_reports_stop() {
        let mut sim = SimDriver::new();
        assert_eq!(sim.wait_state_change().unwrap(), DriverState::Stop);
    }

    #[test]
    fn parameter_roundtrip() {
        let mut sim = SimDriver::new();
        sim.set("xvm", 360.0).unwrap();
        assert_eq!(sim.get("xvm").unwrap(), 360.0);
        assert_eq!(sim.get("mpox").unwrap(), 0.0);
        assert!(sim.get("nope").is_err());
    }

    #[test]
    fn status_reports_carry_segment_line() {
        let mut sim = SimDriver::new();
        let rx = sim.subscribe_status();
        sim.run_segment("G0X0\nG0Y0\nG0Z0").unwrap();
        let report = rx.try_recv().unwrap();
        assert_eq!(report.line, Some(3));
        assert_eq!(report.state, Some(DriverState::Stop));
    }
}
