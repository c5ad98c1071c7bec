//! sbprun entrypoint: load an OpenSBP part program and run it against the
//! simulator backend, echoing the emitted G-code segments to stdout
//! (suppressed with `--quiet`).

use anyhow::{Context, Result};
use clap::Parser;
use core_config::load_from;
use core_driver::SimDriver;
use core_interp::Runtime;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "sbprun", version, about = "OpenSBP motion runtime")]
struct Args {
    /// Part program to run (OpenSBP source).
    pub path: PathBuf,
    /// Optional configuration file path (overrides discovery of `sbprun.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Suppress echoing emitted G-code segments to stdout.
    #[arg(long = "quiet")]
    pub quiet: bool,
    /// Write logs to `sbprun.log` in the working directory.
    #[arg(long = "log-file", default_value_t = false)]
    pub log_file: bool,
}

fn configure_logging(to_file: bool) -> Option<WorkerGuard> {
    if !to_file {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .try_init();
        return None;
    }
    let log_dir = Path::new(".");
    let log_path = log_dir.join("sbprun.log");
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }
    let file_appender = tracing_appender::rolling::never(log_dir, "sbprun.log");
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(nb_writer)
        .try_init()
    {
        Ok(()) => Some(guard),
        // Global subscriber already installed; drop guard so the writer
        // shuts down.
        Err(_err) => None,
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = configure_logging(args.log_file);

    let config = load_from(args.config.clone())?;
    let settings = config.settings();
    debug!(target: "startup", ?settings, "settings_resolved");

    let source = std::fs::read_to_string(&args.path)
        .with_context(|| format!("reading {}", args.path.display()))?;
    let mut runtime = Runtime::load(&source, settings)
        .with_context(|| format!("loading {}", args.path.display()))?;
    let name = args
        .path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("program.sbp");
    runtime.set_filename(name);

    info!(target: "startup", file = name, lines = source.lines().count(), "program_loaded");

    // Hardware transport selection belongs to the process manager; the
    // standalone binary always simulates.
    let mut driver = if args.quiet {
        SimDriver::new()
    } else {
        SimDriver::with_echo()
    };

    let summary = runtime
        .run(&mut driver)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("running {name}"))?;

    info!(
        target: "runtime",
        executed = summary.executed,
        segments = summary.segments,
        stopped = summary.stopped,
        x = summary.final_pos.x,
        y = summary.final_pos.y,
        z = summary.final_pos.z,
        "run_complete"
    );
    Ok(())
}
