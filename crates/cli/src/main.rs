//! # cosim
//!
//! Drives a lane-engine co-simulation session from a configuration file:
//! - configuration loading and validation
//! - the tick loop with tick-report dispatch
//! - graceful shutdown on Ctrl+C / SIGTERM

mod cli;
mod commands;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_info, run_pipeline, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    observability::init_with_config(ObservabilityConfig::for_verbosity(
        cli.log_format.into(),
        cli.verbose,
        cli.quiet,
    ))?;

    info!(version = env!("CARGO_PKG_VERSION"), "cosim starting");

    let result = match &cli.command {
        Commands::Run(args) => run_pipeline(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}
