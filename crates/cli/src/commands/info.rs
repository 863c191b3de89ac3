//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::CosimConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    lane: LaneInfo,
    traffic_lights: TrafficLightInfo,
    actors: ActorInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct LaneInfo {
    host: String,
    port: u16,
    client_order: i32,
    step_length: f64,
}

#[derive(Serialize)]
struct TrafficLightInfo {
    external_program_id: String,
    mirror: bool,
}

#[derive(Serialize)]
struct ActorInfo {
    placeholder_route_id: String,
    id_prefix: String,
    tracking: String,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
    #[serde(skip_serializing_if = "std::collections::HashMap::is_empty")]
    params: std::collections::HashMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&config, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config, args);
    }

    Ok(())
}

fn build_config_info(config: &CosimConfig, args: &InfoArgs) -> ConfigInfo {
    let sinks = if args.sinks {
        config
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                queue_capacity: s.queue_capacity,
                params: s.params.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", config.version),
        lane: LaneInfo {
            host: config.lane.host.clone(),
            port: config.lane.port,
            client_order: config.lane.client_order,
            step_length: config.lane.step_length,
        },
        traffic_lights: TrafficLightInfo {
            external_program_id: config.traffic_lights.external_program_id.clone(),
            mirror: config.traffic_lights.mirror,
        },
        actors: ActorInfo {
            placeholder_route_id: config.actors.placeholder_route_id.clone(),
            id_prefix: config.actors.id_prefix.clone(),
            tracking: format!("{:?}", config.actors.tracking),
        },
        sinks,
    }
}

fn print_config_info(config: &CosimConfig, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Co-simulation Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🛣  Lane engine");
    println!("   ├─ Version: {:?}", config.version);
    println!("   ├─ Address: {}:{}", config.lane.host, config.lane.port);
    println!("   ├─ Client order: {}", config.lane.client_order);
    println!("   └─ Step length: {}s", config.lane.step_length);

    println!("\n🚦 Traffic lights");
    println!(
        "   ├─ External program: {}",
        config.traffic_lights.external_program_id
    );
    println!("   └─ Mirror to world: {}", config.traffic_lights.mirror);

    println!("\n🚗 Actors");
    println!("   ├─ Placeholder route: {}", config.actors.placeholder_route_id);
    println!("   ├─ Id prefix: {}", config.actors.id_prefix);
    println!("   └─ Tracking: {:?}", config.actors.tracking);

    if config.sinks.is_empty() {
        println!("\n📤 Sinks: none");
    } else {
        println!("\n📤 Sinks ({})", config.sinks.len());
        for (i, sink) in config.sinks.iter().enumerate() {
            let is_last = i == config.sinks.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            if args.sinks {
                println!(
                    "   {} {} ({:?}, queue {}) {:?}",
                    prefix, sink.name, sink.sink_type, sink.queue_capacity, sink.params
                );
            } else {
                println!("   {} {} ({:?})", prefix, sink.name, sink.sink_type);
            }
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{SinkConfig, SinkType};
    use std::path::PathBuf;

    #[test]
    fn test_sinks_only_listed_on_request() {
        let config = CosimConfig {
            sinks: vec![SinkConfig {
                name: "log".to_string(),
                sink_type: SinkType::Log,
                queue_capacity: 10,
                params: Default::default(),
            }],
            ..Default::default()
        };
        let mut args = InfoArgs {
            config: PathBuf::from("cosim.toml"),
            json: true,
            sinks: false,
        };
        assert!(build_config_info(&config, &args).sinks.is_empty());

        args.sinks = true;
        let info = build_config_info(&config, &args);
        assert_eq!(info.sinks.len(), 1);
        assert_eq!(info.lane.port, 8813);
        assert_eq!(info.actors.tracking, "EngineLists");
    }
}
