//! Scenario harness: run an OpenSBP source string against the simulator and
//! hand back the shipped G-code for assertions.

use core_config::DriveSettings;
use core_driver::{SimDriver, StatusReport};
use core_interp::{RunSummary, Runtime};

pub struct Scenario {
    pub settings: DriveSettings,
    pub status: Vec<StatusReport>,
    pub params: Vec<(&'static str, f64)>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            settings: DriveSettings::default(),
            status: Vec::new(),
            params: Vec::new(),
        }
    }
}

impl Scenario {
    pub fn run(self, source: &str) -> ScenarioResult {
        let mut rt = Runtime::load(source, self.settings).expect("program should load");
        let mut driver = SimDriver::new();
        for (key, value) in self.params {
            driver.set_param(key, value);
        }
        for report in self.status {
            driver.push_status(report);
        }
        let summary = rt.run(&mut driver).expect("program should run");
        ScenarioResult { driver, summary }
    }
}

pub struct ScenarioResult {
    pub driver: SimDriver,
    pub summary: RunSummary,
}

impl ScenarioResult {
    pub fn lines(&self) -> Vec<String> {
        self.driver.gcode_lines()
    }

    pub fn segments(&self) -> &[String] {
        self.driver.segments()
    }
}

/// Run with default settings and no primed driver state.
pub fn run_program(source: &str) -> ScenarioResult {
    Scenario::default().run(source)
}
