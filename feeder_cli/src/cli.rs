//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Keeps the non-blocking file logger's worker alive for the life of the
/// process.
pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "feeder", version, about = "Pet feeder control loop")]
pub struct Cli {
    /// Path to config TOML; built-in defaults are used when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Emit telemetry and logs as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the control loop against the simulated rig (or the real
    /// device when built with the `hardware` feature)
    Run {
        /// Number of ticks to simulate; 0 runs in real time until Ctrl-C
        #[arg(long, value_name = "N", default_value_t = 0)]
        ticks: u32,

        /// Milliseconds advanced per control tick
        #[arg(long, value_name = "MS", default_value_t = 10)]
        tick_ms: u32,

        /// Start a dispense cycle immediately, bypassing the feed gate
        #[arg(long, action = ArgAction::SetTrue)]
        feed: bool,

        /// Override schedule.grams_per_day from the config
        #[arg(long, value_name = "GRAMS")]
        grams_per_day: Option<i32>,

        /// One-off deficit adjustment; negative accounts for food given
        /// by hand
        #[arg(long, value_name = "MG")]
        adjust_deficit_mg: Option<i32>,

        /// Initial reservoir content of the simulated rig
        #[arg(long, value_name = "GRAMS", default_value_t = 500.0)]
        reservoir_g: f32,

        /// Initial bowl content of the simulated rig
        #[arg(long, value_name = "GRAMS", default_value_t = 0.0)]
        bowl_g: f32,

        /// Jam the simulated mechanism (the cam turns, no food moves)
        #[arg(long, action = ArgAction::SetTrue)]
        jam: bool,

        /// Uniform raw-count noise added to simulated ADC readings
        #[arg(long, value_name = "COUNTS", default_value_t = 0)]
        noise_counts: i32,

        /// Telemetry emission interval
        #[arg(long, value_name = "MS", default_value_t = 1_000)]
        telemetry_ms: u32,
    },

    /// Parse the config, build a controller and tick it briefly
    SelfCheck,
}
