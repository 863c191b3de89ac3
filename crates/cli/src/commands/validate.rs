//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{CosimConfig, TrackingMode};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    lane_engine: String,
    step_length: f64,
    tracking: String,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    lane_engine: format!("{}:{}", config.lane.host, config.lane.port),
                    step_length: config.lane.step_length,
                    tracking: format!("{:?}", config.actors.tracking),
                    sink_count: config.sinks.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Non-fatal issues
fn collect_warnings(config: &CosimConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.sinks.is_empty() {
        warnings.push("No sinks configured - tick reports will be dropped".to_string());
    }
    if !config.traffic_lights.mirror {
        warnings.push(
            "traffic_lights.mirror is off - world lights are never updated from the lane engine"
                .to_string(),
        );
    }
    if config.actors.tracking == TrackingMode::SnapshotDiff {
        warnings.push(
            "actors.tracking = snapshot_diff fetches the full vehicle list every tick".to_string(),
        );
    }
    if config.lane.step_length > 1.0 {
        warnings.push(format!(
            "lane.step_length = {}s is coarse for co-simulation",
            config.lane.step_length
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Lane engine: {}", summary.lane_engine);
            println!("  Step length: {}s", summary.step_length);
            println!("  Tracking: {}", summary.tracking);
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_config_warnings() {
        let warnings = collect_warnings(&CosimConfig::default());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("No sinks"));
    }

    #[test]
    fn test_invalid_file_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[lane]\nstep_length = -1.0\n").unwrap();

        let result = validate_config(&ValidateArgs {
            config: path,
            json: true,
        });
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("step_length"));
    }

    #[test]
    fn test_missing_file() {
        let result = validate_config(&ValidateArgs {
            config: PathBuf::from("/nonexistent/cosim.toml"),
            json: false,
        });
        assert!(!result.valid);
    }
}
