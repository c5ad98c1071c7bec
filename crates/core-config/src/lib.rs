//! Runtime settings record and configuration loading.
//!
//! `DriveSettings` is the mutable per-runtime configuration the command
//! handlers read and write (feed speeds, cutter geometry, retract heights).
//! It is owned by the runtime instance, never shared: two runtimes or a
//! runtime and a test can hold independent copies.
//!
//! `sbprun.toml` (or an override path provided by the binary) supplies the
//! initial values; absent files or unknown fields fall back to defaults so a
//! bare checkout runs without any configuration.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::info;

// -------------------------------------------------------------------------------------------------
// Settings record
// -------------------------------------------------------------------------------------------------

/// Axis group selector for speed lookups. X and Y share one feed setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedAxis {
    Xy,
    Z,
    A,
    B,
    C,
}

/// Per-runtime drive parameters. Speeds are in machine units per second;
/// G-code feeds are derived as `speed * 60` (units per minute).
#[derive(Debug, Clone, PartialEq)]
pub struct DriveSettings {
    pub movexy_speed: f64,
    pub movez_speed: f64,
    pub movea_speed: f64,
    pub moveb_speed: f64,
    pub movec_speed: f64,
    pub jogxy_speed: f64,
    pub jogz_speed: f64,
    pub joga_speed: f64,
    pub jogb_speed: f64,
    pub jogc_speed: f64,
    /// Cutter diameter used by pocketing step-over and compensation.
    pub cutter_dia: f64,
    /// Pocket pass overlap, percent of cutter diameter.
    pub pocket_overlap: f64,
    /// Absolute Z height for retracts between passes.
    pub safe_z_pull_up: f64,
    /// Absolute A position for rotary retracts.
    pub safe_a_pull_up: f64,
    /// Plunge direction selector carried for custom post-processing.
    pub plunge_dir: f64,
}

impl Default for DriveSettings {
    fn default() -> Self {
        Self {
            movexy_speed: 2.0,
            movez_speed: 1.0,
            movea_speed: 1.0,
            moveb_speed: 1.0,
            movec_speed: 1.0,
            jogxy_speed: 6.0,
            jogz_speed: 4.0,
            joga_speed: 4.0,
            jogb_speed: 4.0,
            jogc_speed: 4.0,
            cutter_dia: 0.25,
            pocket_overlap: 10.0,
            safe_z_pull_up: 0.25,
            safe_a_pull_up: 0.0,
            plunge_dir: 1.0,
        }
    }
}

impl DriveSettings {
    pub fn move_speed(&self, axis: SpeedAxis) -> f64 {
        match axis {
            SpeedAxis::Xy => self.movexy_speed,
            SpeedAxis::Z => self.movez_speed,
            SpeedAxis::A => self.movea_speed,
            SpeedAxis::B => self.moveb_speed,
            SpeedAxis::C => self.movec_speed,
        }
    }

    pub fn jog_speed(&self, axis: SpeedAxis) -> f64 {
        match axis {
            SpeedAxis::Xy => self.jogxy_speed,
            SpeedAxis::Z => self.jogz_speed,
            SpeedAxis::A => self.joga_speed,
            SpeedAxis::B => self.jogb_speed,
            SpeedAxis::C => self.jogc_speed,
        }
    }

    pub fn set_move_speed(&mut self, axis: SpeedAxis, v: f64) {
        match axis {
            SpeedAxis::Xy => self.movexy_speed = v,
            SpeedAxis::Z => self.movez_speed = v,
            SpeedAxis::A => self.movea_speed = v,
            SpeedAxis::B => self.moveb_speed = v,
            SpeedAxis::C => self.movec_speed = v,
        }
    }

    pub fn set_jog_speed(&mut self, axis: SpeedAxis, v: f64) {
        match axis {
            SpeedAxis::Xy => self.jogxy_speed = v,
            SpeedAxis::Z => self.jogz_speed = v,
            SpeedAxis::A => self.joga_speed = v,
            SpeedAxis::B => self.jogb_speed = v,
            SpeedAxis::C => self.jogc_speed = v,
        }
    }

    /// Concentric pocket pass step-over: cutter diameter reduced by the
    /// configured overlap percentage.
    pub fn pocket_step(&self) -> f64 {
        self.cutter_dia * (1.0 - self.pocket_overlap / 100.0)
    }
}

// -------------------------------------------------------------------------------------------------
// Configuration file
// -------------------------------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default, Clone)]
pub struct SpeedsSection {
    pub move_xy: Option<f64>,
    pub move_z: Option<f64>,
    pub move_a: Option<f64>,
    pub move_b: Option<f64>,
    pub move_c: Option<f64>,
    pub jog_xy: Option<f64>,
    pub jog_z: Option<f64>,
    pub jog_a: Option<f64>,
    pub jog_b: Option<f64>,
    pub jog_c: Option<f64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct CutterSection {
    pub diameter: Option<f64>,
    pub pocket_overlap: Option<f64>,
    pub safe_z_pull_up: Option<f64>,
    pub safe_a_pull_up: Option<f64>,
    pub plunge_dir: Option<f64>,
}

/// Raw deserialized shape of `sbprun.toml`. Unknown fields are ignored
/// (TOML deserialization tolerance) to allow forward evolution.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub speeds: SpeedsSection,
    #[serde(default)]
    pub cutter: CutterSection,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Original file string, kept for diagnostics.
    pub raw: Option<String>,
    /// Parsed (or default) data.
    pub file: ConfigFile,
}

impl Config {
    /// Fold the parsed file over the default settings record.
    pub fn settings(&self) -> DriveSettings {
        let mut s = DriveSettings::default();
        let sp = &self.file.speeds;
        if let Some(v) = sp.move_xy {
            s.movexy_speed = v;
        }
        if let Some(v) = sp.move_z {
            s.movez_speed = v;
        }
        if let Some(v) = sp.move_a {
            s.movea_speed = v;
        }
        if let Some(v) = sp.move_b {
            s.moveb_speed = v;
        }
        if let Some(v) = sp.move_c {
            s.movec_speed = v;
        }
        if let Some(v) = sp.jog_xy {
            s.jogxy_speed = v;
        }
        if let Some(v) = sp.jog_z {
            s.jogz_speed = v;
        }
        if let Some(v) = sp.jog_a {
            s.joga_speed = v;
        }
        if let Some(v) = sp.jog_b {
            s.jogb_speed = v;
        }
        if let Some(v) = sp.jog_c {
            s.jogc_speed = v;
        }
        let cu = &self.file.cutter;
        if let Some(v) = cu.diameter {
            s.cutter_dia = v;
        }
        if let Some(v) = cu.pocket_overlap {
            s.pocket_overlap = v;
        }
        if let Some(v) = cu.safe_z_pull_up {
            s.safe_z_pull_up = v;
        }
        if let Some(v) = cu.safe_a_pull_up {
            s.safe_a_pull_up = v;
        }
        if let Some(v) = cu.plunge_dir {
            s.plunge_dir = v;
        }
        s
    }
}

/// Best-effort config path following platform conventions: working-directory
/// `sbprun.toml` first, then the platform config dir.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("sbprun.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("sbprun").join("sbprun.toml");
    }
    PathBuf::from("sbprun.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => {
                info!(target: "config", path = %path.display(), "config_loaded");
                Ok(Config {
                    raw: Some(content),
                    file,
                })
            }
            // On parse error fall back to defaults rather than refusing to run.
            Err(_e) => Ok(Config::default()),
        }
    } else {
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_absent() {
        let cfg = Config::default();
        assert_eq!(cfg.settings(), DriveSettings::default());
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let file: ConfigFile = toml::from_str(
            r#"
            [speeds]
            move_xy = 5.0
            [cutter]
            diameter = 0.5
            pocket_overlap = 25.0
            "#,
        )
        .unwrap();
        let cfg = Config {
            raw: None,
            file,
        };
        let s = cfg.settings();
        assert_eq!(s.movexy_speed, 5.0);
        assert_eq!(s.movez_speed, DriveSettings::default().movez_speed);
        assert_eq!(s.cutter_dia, 0.5);
        assert_eq!(s.pocket_overlap, 25.0);
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let parsed: Result<ConfigFile, _> = toml::from_str(
            r#"
            future_section = true
            [speeds]
            move_z = 0.75
            "#,
        );
        assert_eq!(parsed.unwrap().speeds.move_z, Some(0.75));
    }

    #[test]
    fn load_from_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sbprun.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "[speeds]\nmove_xy = 3.5").unwrap();
        let cfg = load_from(Some(path)).unwrap();
        assert_eq!(cfg.settings().movexy_speed, 3.5);
        assert!(cfg.raw.is_some());
    }

    #[test]
    fn pocket_step_applies_overlap() {
        let mut s = DriveSettings::default();
        s.cutter_dia = 0.5;
        s.pocket_overlap = 20.0;
        assert!((s.pocket_step() - 0.4).abs() < 1e-12);
    }
}
