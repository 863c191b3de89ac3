//! `run` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::CosimConfig;
use lane_client::TraciClient;
use tracing::{info, warn};

use crate::cli::{EngineKind, RunArgs};
use crate::pipeline::{demo_engine, Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let mut config = ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut config, args);
    ConfigLoader::validate(&config).context("Invalid configuration after CLI overrides")?;

    info!(
        host = %config.lane.host,
        port = config.lane.port,
        step_length = config.lane.step_length,
        tracking = ?config.actors.tracking,
        sinks = config.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        config: config.clone(),
        max_steps: (args.steps > 0).then_some(args.steps),
        buffer_size: args.buffer_size,
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    let stats = match args.engine {
        EngineKind::Traci => pipeline.run(TraciClient::new(), shutdown_signal()).await,
        EngineKind::Mock => {
            info!("Running against the in-process demo engine");
            pipeline.run(demo_engine(&config), shutdown_signal()).await
        }
    }
    .context("Co-simulation run failed")?;

    info!(
        ticks = stats.ticks,
        duration_secs = stats.duration.as_secs_f64(),
        tick_rate = format!("{:.1}", stats.tick_rate()),
        "Run completed"
    );
    stats.print_summary();

    Ok(())
}

fn apply_overrides(config: &mut CosimConfig, args: &RunArgs) {
    if let Some(ref host) = args.host {
        info!(host = %host, "Overriding lane engine host from CLI");
        config.lane.host = host.clone();
    }
    if let Some(port) = args.port {
        info!(port, "Overriding lane engine port from CLI");
        config.lane.port = port;
    }
}

/// Resolves on Ctrl+C or SIGTERM. A handler that cannot be installed never
/// fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn print_config_summary(config: &CosimConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Lane engine:");
    println!("  Address: {}:{}", config.lane.host, config.lane.port);
    println!("  Client order: {}", config.lane.client_order);
    println!("  Step length: {}s", config.lane.step_length);
    println!("\nTraffic lights:");
    println!("  External program: {}", config.traffic_lights.external_program_id);
    println!("  Mirror to world: {}", config.traffic_lights.mirror);
    println!("\nActors:");
    println!("  Placeholder route: {}", config.actors.placeholder_route_id);
    println!("  Id prefix: {}", config.actors.id_prefix);
    println!("  Tracking: {:?}", config.actors.tracking);

    if !config.sinks.is_empty() {
        println!("\nSinks ({}):", config.sinks.len());
        for sink in &config.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args() -> RunArgs {
        RunArgs {
            config: PathBuf::from("cosim.toml"),
            host: None,
            port: None,
            steps: 0,
            engine: EngineKind::Mock,
            dry_run: false,
            buffer_size: 100,
            metrics_port: 0,
        }
    }

    #[test]
    fn test_overrides_replace_lane_address() {
        let mut config = CosimConfig::default();
        let args = RunArgs {
            host: Some("10.0.0.7".to_string()),
            port: Some(9999),
            ..args()
        };
        apply_overrides(&mut config, &args);
        assert_eq!(config.lane.host, "10.0.0.7");
        assert_eq!(config.lane.port, 9999);
    }

    #[test]
    fn test_no_overrides_keep_file_values() {
        let mut config = CosimConfig::default();
        apply_overrides(&mut config, &args());
        assert_eq!(config.lane.host, "localhost");
        assert_eq!(config.lane.port, 8813);
    }

    #[tokio::test]
    async fn test_missing_config_fails() {
        let args = RunArgs {
            config: PathBuf::from("/nonexistent/cosim.toml"),
            ..args()
        };
        let err = run_pipeline(&args).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_mock_run_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cosim.toml");
        std::fs::write(&path, "[lane]\nstep_length = 0.1\n").unwrap();

        let args = RunArgs {
            config: path,
            steps: 5,
            ..args()
        };
        run_pipeline(&args).await.unwrap();
    }
}
