//! Config validation
//!
//! Rules:
//! - step_length finite and > 0
//! - port != 0, client_order >= 1
//! - sentinel program id, placeholder route and id prefix non-empty
//! - sink names non-empty and unique, file sinks carry a `path`

use std::collections::HashSet;

use contracts::{ContractError, CosimConfig, SinkType};

/// Validate a CosimConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &CosimConfig) -> Result<(), ContractError> {
    validate_lane(config)?;
    validate_identifiers(config)?;
    validate_sinks(config)?;
    Ok(())
}

fn validate_lane(config: &CosimConfig) -> Result<(), ContractError> {
    let lane = &config.lane;

    if !lane.step_length.is_finite() || lane.step_length <= 0.0 {
        return Err(ContractError::config_validation(
            "lane.step_length",
            format!("step_length must be > 0, got {}", lane.step_length),
        ));
    }

    if lane.port == 0 {
        return Err(ContractError::config_validation(
            "lane.port",
            "port cannot be 0",
        ));
    }

    if lane.client_order < 1 {
        return Err(ContractError::config_validation(
            "lane.client_order",
            format!("client_order must be >= 1, got {}", lane.client_order),
        ));
    }

    if lane.host.trim().is_empty() {
        return Err(ContractError::config_validation(
            "lane.host",
            "host cannot be empty",
        ));
    }

    Ok(())
}

fn validate_identifiers(config: &CosimConfig) -> Result<(), ContractError> {
    let checks = [
        (
            "traffic_lights.external_program_id",
            &config.traffic_lights.external_program_id,
        ),
        (
            "actors.placeholder_route_id",
            &config.actors.placeholder_route_id,
        ),
        ("actors.id_prefix", &config.actors.id_prefix),
    ];

    for (field, value) in checks {
        if value.is_empty() {
            return Err(ContractError::config_validation(field, "cannot be empty"));
        }
    }
    Ok(())
}

fn validate_sinks(config: &CosimConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in config.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("sinks[{}].queue_capacity", sink.name),
                "queue_capacity must be > 0",
            ));
        }
        if sink.sink_type == SinkType::File && !sink.params.contains_key("path") {
            return Err(ContractError::config_validation(
                format!("sinks[{}].params.path", sink.name),
                "file sink requires a 'path' parameter",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SinkConfig;
    use std::collections::HashMap;

    fn minimal_config() -> CosimConfig {
        CosimConfig {
            sinks: vec![SinkConfig {
                name: "log".into(),
                sink_type: SinkType::Log,
                queue_capacity: 100,
                params: HashMap::new(),
            }],
            ..Default::default()
        }
    }

    fn field_of(err: ContractError) -> String {
        match err {
            ContractError::ConfigValidation { field, .. } => field,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&minimal_config()).is_ok());
    }

    #[test]
    fn test_step_length_must_be_positive() {
        for bad in [0.0, -0.05, f64::NAN, f64::INFINITY] {
            let mut config = minimal_config();
            config.lane.step_length = bad;
            let err = validate(&config).unwrap_err();
            assert_eq!(field_of(err), "lane.step_length");
        }
    }

    #[test]
    fn test_zero_port() {
        let mut config = minimal_config();
        config.lane.port = 0;
        assert_eq!(field_of(validate(&config).unwrap_err()), "lane.port");
    }

    #[test]
    fn test_client_order_lower_bound() {
        let mut config = minimal_config();
        config.lane.client_order = 0;
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "lane.client_order"
        );
    }

    #[test]
    fn test_empty_sentinel() {
        let mut config = minimal_config();
        config.traffic_lights.external_program_id.clear();
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "traffic_lights.external_program_id"
        );
    }

    #[test]
    fn test_duplicate_sink_name() {
        let mut config = minimal_config();
        config.sinks.push(config.sinks[0].clone());
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_file_sink_requires_path() {
        let mut config = minimal_config();
        config.sinks.push(SinkConfig {
            name: "trace".into(),
            sink_type: SinkType::File,
            queue_capacity: 10,
            params: HashMap::new(),
        });
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "sinks[trace].params.path"
        );
    }
}
