//! Execution engine: the program-counter loop.
//!
//! One logical task advances the interpreter; all parallelism lives in the
//! driver and the transport. Suspension points are exactly the stack-break
//! boundaries: flushing a chunk (awaiting the driver's `running -> stop`
//! transition) and breaking handlers (driver get/set round trips). Between
//! suspensions the engine runs to completion synchronously, so G-code
//! appended before a suspension is always delivered before any driver read
//! performed at it.
//!
//! Cancellation is cooperative: an external holder of the `CancelToken` may
//! stop the run; the engine checks on every resume (and on every loop pass,
//! so a tight `GOTO` cycle that never suspends still terminates), discards
//! the pending chunk, and reports back without advancing further.

use crate::analyze::{analyze, LabelMap};
use crate::chunk::ChunkBuffer;
use crate::classify;
use crate::eval::{EvalContext, Value};
use crate::gcode;
use crate::handlers::{self, Args, HandlerCx};
use crate::status::{MachineState, MachineStatus};
use crate::{AxisPos, LoadError, RuntimeError};
use core_config::DriveSettings;
use core_driver::{Driver, StatusReport};
use core_parse::parse_program;
use core_program::{Expr, Program, Statement};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

// -------------------------------------------------------------------------------------------------
// Cancellation
// -------------------------------------------------------------------------------------------------

/// Shared stop flag. Clone freely; any holder can cancel the run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of a completed (or externally stopped) run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Statements executed (a conditional and its taken arm count once).
    pub executed: u64,
    /// Segments shipped to the driver.
    pub segments: u64,
    /// True when the run ended through cancellation.
    pub stopped: bool,
    /// Commanded position at the end of the run.
    pub final_pos: AxisPos,
}

// -------------------------------------------------------------------------------------------------
// Runtime
// -------------------------------------------------------------------------------------------------

#[derive(Debug)]
pub struct Runtime {
    program: Program,
    labels: LabelMap,
    settings: DriveSettings,
    vars: HashMap<String, Value>,
    pos: AxisPos,
    chunk: ChunkBuffer,
    status: MachineStatus,
    pc: usize,
    stack: Vec<usize>,
    started: bool,
    sysvar_evaluated: bool,
    chunk_broken_for_eval: bool,
    cancel: CancelToken,
    status_tx: Option<Sender<MachineStatus>>,
    executed: u64,
    segments: u64,
}

impl Runtime {
    /// Parse and analyze a program. Analysis failures abort here: a program
    /// is never partially loaded.
    pub fn load(source: &str, settings: DriveSettings) -> Result<Self, LoadError> {
        let program = parse_program(source)?;
        let labels = analyze(&program)?;
        let mut status = MachineStatus::default();
        status.nb_lines = Some(program.len());
        Ok(Self {
            program,
            labels,
            settings,
            vars: HashMap::new(),
            pos: AxisPos::default(),
            chunk: ChunkBuffer::new(),
            status,
            pc: 0,
            stack: Vec::new(),
            started: false,
            sysvar_evaluated: false,
            chunk_broken_for_eval: false,
            cancel: CancelToken::new(),
            status_tx: None,
            executed: 0,
            segments: 0,
        })
    }

    pub fn set_filename(&mut self, name: &str) {
        self.status.filename = Some(name.to_string());
        self.status.current_file = Some(name.to_string());
    }

    pub fn settings(&self) -> &DriveSettings {
        &self.settings
    }

    pub fn status(&self) -> &MachineStatus {
        &self.status
    }

    /// True once `run` has been entered at least once.
    pub fn has_started(&self) -> bool {
        self.started
    }

    /// True when any evaluation in this run read a system variable.
    pub fn sysvar_evaluated(&self) -> bool {
        self.sysvar_evaluated
    }

    /// True when the most recent stack break was forced by expression
    /// evaluation rather than by a breaking handler.
    pub fn chunk_broken_for_eval(&self) -> bool {
        self.chunk_broken_for_eval
    }

    /// Token an external actor can use to stop the run.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Subscribe to merged status snapshots published at suspension points
    /// and on state transitions.
    pub fn subscribe(&mut self) -> Receiver<MachineStatus> {
        let (tx, rx) = unbounded();
        self.status_tx = Some(tx);
        rx
    }

    /// Run the loaded program to completion against `driver`.
    pub fn run(&mut self, driver: &mut dyn Driver) -> Result<RunSummary, RuntimeError> {
        let status_rx = driver.subscribe_status();
        self.pc = 0;
        self.stack.clear();
        self.chunk.clear();
        self.chunk.set_start(0);
        self.executed = 0;
        self.segments = 0;
        self.started = true;
        self.set_state(MachineState::Running);

        let result = self.run_loop(driver, &status_rx);

        let stopped = self.cancel.is_cancelled();
        self.chunk.clear();
        self.set_state(if stopped {
            MachineState::Stopped
        } else {
            MachineState::Idle
        });
        self.status.clear_file_fields();
        self.publish_status();

        result.map(|()| RunSummary {
            executed: self.executed,
            segments: self.segments,
            stopped,
            final_pos: self.pos,
        })
    }

    fn run_loop(
        &mut self,
        driver: &mut dyn Driver,
        status_rx: &Receiver<StatusReport>,
    ) -> Result<(), RuntimeError> {
        loop {
            self.drain_status(status_rx);
            if self.cancel.is_cancelled() {
                debug!(target: "interp.engine", pc = self.pc, "run_cancelled");
                return Ok(());
            }
            if self.pc >= self.program.len() {
                if self.chunk.is_empty() {
                    debug!(target: "interp.engine", executed = self.executed, "run_complete");
                    return Ok(());
                }
                self.flush(driver, status_rx)?;
                continue;
            }
            let Some(stmt) = self.program.get(self.pc).cloned() else {
                return Ok(());
            };
            if classify::breaks_stack(&stmt) {
                trace!(target: "interp.engine", pc = self.pc, "stack_break");
                self.flush(driver, status_rx)?;
                self.drain_status(status_rx);
                if self.cancel.is_cancelled() {
                    return Ok(());
                }
                self.chunk_broken_for_eval = !classify::has_breaking_mnemonic(&stmt);
                self.execute_statement(&stmt, driver)?;
            } else {
                self.execute_statement(&stmt, driver)?;
            }
            self.executed += 1;
        }
    }

    /// Ship the pending chunk and wait for the driver to come to a stop.
    /// An empty chunk skips both the submission and the state-change wait,
    /// so a stack break landing on an empty buffer cannot deadlock.
    fn flush(
        &mut self,
        driver: &mut dyn Driver,
        status_rx: &Receiver<StatusReport>,
    ) -> Result<(), RuntimeError> {
        let Some(text) = self.chunk.take() else {
            self.chunk.set_start(self.pc);
            return Ok(());
        };
        debug!(
            target: "interp.engine",
            start = self.chunk.start(),
            bytes = text.len(),
            "flush"
        );
        driver
            .run_segment(&text)
            .map_err(|e| self.driver_error(e))?;
        self.segments += 1;
        loop {
            let state = driver
                .wait_state_change()
                .map_err(|e| self.driver_error(e))?;
            self.drain_status(status_rx);
            if state.is_stop() {
                break;
            }
            if self.cancel.is_cancelled() {
                return Ok(());
            }
        }
        self.chunk.set_start(self.pc);
        self.publish_status();
        Ok(())
    }

    fn execute_statement(
        &mut self,
        stmt: &Statement,
        driver: &mut dyn Driver,
    ) -> Result<(), RuntimeError> {
        let line = self.program.line_of(self.pc);
        match stmt {
            Statement::Comment { .. } | Statement::Label { .. } => {
                self.pc += 1;
            }
            Statement::End => {
                self.pc = self.program.len();
            }
            Statement::Goto { label } => {
                self.pc = self.label_target(label, line)?;
            }
            Statement::Gosub { label } => {
                let target = self.label_target(label, line)?;
                self.stack.push(self.pc + 1);
                self.pc = target;
            }
            Statement::Return => {
                self.pc = self
                    .stack
                    .pop()
                    .ok_or(RuntimeError::ReturnUnderflow { line })?;
            }
            Statement::Assign { name, expr } => {
                let value = self.eval_one(expr, line)?;
                trace!(target: "interp.engine", name = %name, value = ?value, "assign");
                self.vars.insert(name.clone(), value);
                self.pc += 1;
            }
            Statement::Pause { expr } => {
                match expr {
                    Some(e) => {
                        let seconds = self
                            .eval_one(e, line)?
                            .as_number()
                            .map_err(|source| RuntimeError::Eval { line, source })?;
                        self.chunk.emit(format!("G4 P{}", gcode::num(seconds)));
                    }
                    // Indefinite pause needs an operator prompt this runtime
                    // does not have; log and continue.
                    None => warn!(target: "interp.engine", line, "indefinite_pause_skipped"),
                }
                self.pc += 1;
            }
            Statement::Cond { test, then } => {
                let value = self.eval_one(test, line)?;
                if value.truthy() {
                    self.execute_statement(then, driver)?;
                } else {
                    self.pc += 1;
                }
            }
            Statement::Cmd { mnemonic, args } => {
                let values = self.eval_args(args, line)?;
                let args = Args::new(*mnemonic, values);
                let mut cx = HandlerCx {
                    chunk: &mut self.chunk,
                    pos: &mut self.pos,
                    settings: &mut self.settings,
                    driver,
                };
                handlers::execute(&mut cx, *mnemonic, &args).map_err(|f| f.at_line(line))?;
                self.pc += 1;
            }
        }
        Ok(())
    }

    fn label_target(&self, label: &str, line: usize) -> Result<usize, RuntimeError> {
        // Analysis verified every target; a miss here is internal corruption.
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| RuntimeError::MissingLabel {
                line,
                label: label.to_string(),
            })
    }

    fn eval_one(&mut self, expr: &Expr, line: usize) -> Result<Value, RuntimeError> {
        let mut cx = EvalContext::new(&self.vars, &self.status, &self.settings);
        let value = cx
            .eval(expr)
            .map_err(|source| RuntimeError::Eval { line, source })?;
        let read = cx.sysvar_read();
        self.sysvar_evaluated |= read;
        Ok(value)
    }

    fn eval_args(
        &mut self,
        args: &[Option<Expr>],
        line: usize,
    ) -> Result<Vec<Option<Value>>, RuntimeError> {
        args.iter()
            .map(|slot| {
                slot.as_ref()
                    .map(|expr| self.eval_one(expr, line))
                    .transpose()
            })
            .collect()
    }

    fn drain_status(&mut self, status_rx: &Receiver<StatusReport>) {
        let mut merged = false;
        while let Ok(report) = status_rx.try_recv() {
            self.status.merge_report(&report, self.chunk.start());
            merged = true;
        }
        if merged {
            self.publish_status();
        }
    }

    fn set_state(&mut self, state: MachineState) {
        debug!(target: "interp.engine", state = %state, "machine_state");
        self.status.state = state;
        self.publish_status();
    }

    fn publish_status(&mut self) {
        if let Some(tx) = &self.status_tx {
            if tx.send(self.status.clone()).is_err() {
                // Observer went away; drop the subscription.
                self.status_tx = None;
            }
        }
    }

    fn driver_error(&self, e: anyhow::Error) -> RuntimeError {
        RuntimeError::Driver {
            line: self.program.line_of(self.pc.min(self.program.len().saturating_sub(1))),
            message: format!("{e:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_driver::SimDriver;

    fn run_source(src: &str) -> (SimDriver, RunSummary) {
        let mut rt = Runtime::load(src, DriveSettings::default()).unwrap();
        let mut driver = SimDriver::new();
        let summary = rt.run(&mut driver).unwrap();
        (driver, summary)
    }

    #[test]
    fn pc_bounds_and_clean_end() {
        let (driver, summary) = run_source("MX,1\nMY,2");
        assert!(!summary.stopped);
        assert_eq!(summary.segments, 1);
        assert_eq!(driver.gcode_lines().len(), 2);
    }

    #[test]
    fn end_statement_terminates_early() {
        let (driver, _) = run_source("MX,1\nEND\nMX,2");
        assert_eq!(driver.gcode_lines(), vec!["G1X1 F120"]);
    }

    #[test]
    fn gosub_return_is_net_zero_on_stack() {
        let (driver, summary) = run_source("GOSUB sub\nEND\nsub:\nMX,1\nRETURN");
        assert_eq!(driver.gcode_lines(), vec!["G1X1 F120"]);
        assert!(!summary.stopped);
    }

    #[test]
    fn return_with_empty_stack_is_fatal() {
        let mut rt = Runtime::load("RETURN", DriveSettings::default()).unwrap();
        let mut driver = SimDriver::new();
        let err = rt.run(&mut driver).unwrap_err();
        assert!(matches!(err, RuntimeError::ReturnUnderflow { line: 1 }));
        // Fatal errors still reset the machine to idle.
        assert_eq!(rt.status().state, MachineState::Idle);
    }

    #[test]
    fn conditional_goto_skips_when_false() {
        let src = "&a = 0\nIF &a > 1 THEN GOTO skip\nMX,1\nEND\nskip:\nMX,2";
        let (driver, _) = run_source(src);
        assert_eq!(driver.gcode_lines(), vec!["G1X1 F120"]);
    }

    #[test]
    fn conditional_goto_taken_when_true() {
        let src = "&a = 5\nIF &a > 1 THEN GOTO skip\nMX,1\nEND\nskip:\nMX,2";
        let (driver, _) = run_source(src);
        assert_eq!(driver.gcode_lines(), vec!["G1X2 F120"]);
    }

    #[test]
    fn pause_emits_dwell() {
        let (driver, _) = run_source("PAUSE 2\nMX,1");
        assert_eq!(driver.gcode_lines()[0], "G4 P2");
    }

    #[test]
    fn pause_without_expression_is_skipped() {
        let (driver, _) = run_source("PAUSE\nMX,1");
        assert_eq!(driver.gcode_lines(), vec!["G1X1 F120"]);
    }

    #[test]
    fn sysvar_statement_breaks_and_reads_mirror() {
        let mut rt = Runtime::load("MX,1\nMX,%(1)", DriveSettings::default()).unwrap();
        let mut driver = SimDriver::new();
        driver.push_status(StatusReport {
            posx: Some(7.5),
            ..StatusReport::default()
        });
        rt.run(&mut driver).unwrap();
        // The sysvar read forced a flush: two segments, second uses posx.
        assert_eq!(driver.segments().len(), 2);
        assert_eq!(driver.segments()[0], "G1X1 F120");
        assert_eq!(driver.segments()[1], "G1X7.5 F120");
        assert!(rt.sysvar_evaluated());
        assert!(rt.chunk_broken_for_eval());
    }

    #[test]
    fn breaking_command_flushes_prior_chunk_first() {
        let mut rt = Runtime::load("MX,2\nZX\nMX,1", DriveSettings::default()).unwrap();
        let mut driver = SimDriver::new();
        driver.set_param("mpox", 3.25);
        rt.run(&mut driver).unwrap();
        assert_eq!(driver.segments().len(), 2);
        assert_eq!(driver.segments()[0], "G1X2 F120");
        assert_eq!(driver.segments()[1], "G10 L2 P2 X3.25\nG1X1 F120");
        assert!(!rt.chunk_broken_for_eval());
    }

    #[test]
    fn cancellation_stops_a_tight_loop() {
        let mut rt =
            Runtime::load("top:\nMX,1\nGOTO top", DriveSettings::default()).unwrap();
        let token = rt.cancel_token();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            token.cancel();
        });
        let mut driver = SimDriver::new();
        let summary = rt.run(&mut driver).unwrap();
        handle.join().unwrap();
        assert!(summary.stopped);
        assert_eq!(rt.status().state, MachineState::Stopped);
        // The pending chunk was discarded, nothing was shipped.
        assert_eq!(driver.segments().len(), 0);
    }

    #[test]
    fn status_line_projection_uses_chunk_start() {
        let mut rt = Runtime::load("MX,1\nMY,2\nZX", DriveSettings::default()).unwrap();
        let mut driver = SimDriver::new();
        rt.run(&mut driver).unwrap();
        // The first chunk began at statement 0 and carried 2 lines; the
        // driver's stop report put its relative line counter at 2.
        assert_eq!(rt.status().posx, 0.0);
    }

    #[test]
    fn run_clears_file_fields_on_end() {
        let mut rt = Runtime::load("MX,1", DriveSettings::default()).unwrap();
        rt.set_filename("part.sbp");
        let mut driver = SimDriver::new();
        rt.run(&mut driver).unwrap();
        assert_eq!(rt.status().filename, None);
        assert_eq!(rt.status().nb_lines, None);
        assert_eq!(rt.status().line, None);
        assert_eq!(rt.status().state, MachineState::Idle);
    }
}
