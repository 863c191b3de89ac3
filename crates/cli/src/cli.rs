//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// cosim - lane-engine / world-engine co-simulation bridge
#[derive(Parser, Debug)]
#[command(
    name = "cosim",
    author,
    version,
    about = "Lane-engine / world-engine co-simulation bridge",
    long_about = "Steps a lane-level traffic engine in lockstep with a world engine.\n\n\
                  Connects to the lane engine, mirrors its traffic lights onto world \n\
                  landmarks, tracks vehicles entering and leaving, and writes a tick \n\
                  report per step to the configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "COSIM_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "COSIM_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the co-simulation tick loop
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "cosim.toml", env = "COSIM_CONFIG")]
    pub config: PathBuf,

    /// Override lane engine host from configuration
    #[arg(long, env = "COSIM_LANE_HOST")]
    pub host: Option<String>,

    /// Override lane engine port from configuration
    #[arg(long, env = "COSIM_LANE_PORT")]
    pub port: Option<u16>,

    /// Number of steps to run (0 = until interrupted)
    #[arg(long, default_value = "0", env = "COSIM_STEPS")]
    pub steps: u64,

    /// Lane engine backend
    #[arg(long, value_enum, default_value = "traci", env = "COSIM_ENGINE")]
    pub engine: EngineKind,

    /// Validate configuration and exit without connecting
    #[arg(long)]
    pub dry_run: bool,

    /// Tick report channel size
    #[arg(long, default_value = "100", env = "COSIM_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", env = "COSIM_METRICS_PORT")]
    pub metrics_port: u16,
}

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "cosim.toml", env = "COSIM_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "cosim.toml", env = "COSIM_CONFIG")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show sink configuration
    #[arg(long)]
    pub sinks: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

/// Lane engine backend
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EngineKind {
    /// TraCI over TCP
    #[default]
    Traci,
    /// In-process demo engine, no server required
    Mock,
}
