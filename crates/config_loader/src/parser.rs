//! Config parsing
//!
//! TOML is the primary format, JSON is accepted as well.

use contracts::{ContractError, CosimConfig};

/// Config file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (recommended)
    Toml,
    Json,
}

impl ConfigFormat {
    /// Infer format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn parse_toml(content: &str) -> Result<CosimConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse_json(content: &str) -> Result<CosimConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse(content: &str, format: ConfigFormat) -> Result<CosimConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{SinkType, TrackingMode};

    #[test]
    fn test_parse_toml_full() {
        let content = r#"
[lane]
host = "10.0.0.5"
port = 9000
client_order = 2
step_length = 0.1

[traffic_lights]
external_program_id = "ext"
mirror = false

[actors]
placeholder_route_id = "bridge_route"
id_prefix = "world"
tracking = "snapshot_diff"

[[sinks]]
name = "trace"
sink_type = "file"
[sinks.params]
path = "/tmp/trace.jsonl"
"#;
        let config = parse_toml(content).unwrap();
        assert_eq!(config.lane.host, "10.0.0.5");
        assert_eq!(config.lane.port, 9000);
        assert_eq!(config.lane.client_order, 2);
        assert_eq!(config.traffic_lights.external_program_id, "ext");
        assert!(!config.traffic_lights.mirror);
        assert_eq!(config.actors.tracking, TrackingMode::SnapshotDiff);
        assert_eq!(config.sinks[0].sink_type, SinkType::File);
        assert_eq!(config.sinks[0].queue_capacity, 100);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "lane": { "port": 8813 },
            "sinks": [{ "name": "log", "sink_type": "log" }]
        }"#;
        let config = parse_json(content).unwrap();
        assert_eq!(config.lane.host, "localhost");
        assert_eq!(config.sinks.len(), 1);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let result = parse_toml("invalid toml [[[");
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_unknown_sink_type_rejected() {
        let content = r#"
[[sinks]]
name = "net"
sink_type = "network"
"#;
        assert!(parse_toml(content).is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
