//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "breath", version, about = "Breathing-guidance pacer CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/breath_config.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a guided breathing session until interrupted
    Run {
        /// Override the warmup phase length in seconds
        #[arg(long, value_name = "SECS")]
        warmup_s: Option<f64>,
        /// Override the mirror/calibration phase length in seconds
        #[arg(long, value_name = "SECS")]
        mirror_s: Option<f64>,
        /// Print display-protocol cue lines (ANIM:INHALE / ANIM:EXHALE)
        /// on stdout
        #[arg(long, action = ArgAction::SetTrue)]
        announce: bool,
        /// Write per-tick snapshots to FILE as JSON lines
        #[arg(long, value_name = "FILE")]
        snapshots: Option<PathBuf>,
        /// Breath period of the simulated sensor in seconds (builds
        /// without the `hardware` feature only)
        #[arg(long, value_name = "SECS")]
        sim_breath_s: Option<f64>,
        /// Stop automatically after this many seconds (default: run until
        /// interrupted)
        #[arg(long, value_name = "SECS")]
        duration_s: Option<f64>,
    },
    /// Accept display-client connections and relay cue events
    /// (line protocol: RUN:FIX / STOP, replies + ANIM:<LABEL> stream)
    Serve {
        /// Override the configured listen address
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },
    /// Quick health check (hardware presence / sim ok)
    SelfCheck,
    /// Park the actuator carriage at the floor position
    Reset,
}
