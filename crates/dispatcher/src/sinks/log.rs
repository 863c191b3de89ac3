//! LogSink - one tracing event per tick

use contracts::{ContractError, DataSink, LightState, TickReport};
use tracing::{info, instrument, warn};

/// Sink that logs tick summaries
pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_report(&self, report: &TickReport) {
        let red = report
            .lights
            .values()
            .filter(|s| **s == LightState::Red)
            .count();

        info!(
            sink = %self.name,
            step = report.step,
            sim_time = report.sim_time,
            spawned = report.spawned.len(),
            destroyed = report.destroyed.len(),
            landmarks = report.lights.len(),
            red,
            tick_ms = report.tick_duration_ms,
            "tick"
        );

        for (landmark, reason) in &report.translation_errors {
            warn!(
                sink = %self.name,
                step = report.step,
                landmark = %landmark,
                reason = %reason,
                "untranslated landmark"
            );
        }
    }
}

impl DataSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "log_sink_write", skip(self, report), fields(step = report.step))]
    async fn write(&mut self, report: &TickReport) -> Result<(), ContractError> {
        self.log_report(report);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "log sink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_log_sink_write() {
        let mut sink = LogSink::new("log");
        let report = TickReport {
            step: 7,
            lights: BTreeMap::from([("1032".into(), LightState::Red)]),
            translation_errors: BTreeMap::from([("1040".into(), "4 directions".to_string())]),
            ..Default::default()
        };
        assert!(sink.write(&report).await.is_ok());
        assert_eq!(sink.name(), "log");
    }
}
