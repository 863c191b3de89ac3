//! FileSink - appends tick reports as JSON lines

use contracts::{ContractError, DataSink, TickReport};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output file, one JSON object per line
    pub path: PathBuf,
    /// Append to an existing file instead of truncating it
    pub append: bool,
}

impl FileSinkConfig {
    /// Read `path` (required) and `append` (optional, default false)
    pub fn from_params(params: &HashMap<String, String>) -> io::Result<Self> {
        let path = params.get("path").map(PathBuf::from).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "file sink requires a 'path' param")
        })?;
        let append = params.get("append").is_some_and(|v| v == "true");
        Ok(Self { path, append })
    }
}

/// Sink that writes each report as one line of JSON
pub struct FileSink {
    name: String,
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileSink {
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> io::Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(config.append)
            .truncate(!config.append)
            .open(&config.path)?;

        Ok(Self {
            name: name.into(),
            path: config.path,
            writer: BufWriter::new(file),
        })
    }

    pub fn from_params(name: impl Into<String>, params: &HashMap<String, String>) -> io::Result<Self> {
        Self::new(name, FileSinkConfig::from_params(params)?)
    }

    fn append_line(&mut self, report: &TickReport) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, report)?;
        self.writer.write_all(b"\n")
    }
}

impl DataSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "file_sink_write", skip(self, report), fields(sink = %self.name, step = report.step))]
    async fn write(&mut self, report: &TickReport) -> Result<(), ContractError> {
        self.append_line(report)
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        self.writer
            .flush()
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.flush().await?;
        debug!(sink = %self.name, path = %self.path.display(), "file sink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::LightState;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_writes_one_line_per_report() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace/ticks.jsonl");
        let mut sink = FileSink::new(
            "trace",
            FileSinkConfig {
                path: path.clone(),
                append: false,
            },
        )
        .unwrap();

        for step in 1..=3 {
            let report = TickReport {
                step,
                lights: BTreeMap::from([("1032".into(), LightState::Green)]),
                ..Default::default()
            };
            sink.write(&report).await.unwrap();
        }
        sink.close().await.unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        let last: TickReport = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(last.step, 3);
        assert_eq!(last.lights.get("1032"), Some(&LightState::Green));
    }

    #[test]
    fn test_config_requires_path() {
        assert!(FileSinkConfig::from_params(&HashMap::new()).is_err());
        let config = FileSinkConfig::from_params(&HashMap::from([
            ("path".to_string(), "out.jsonl".to_string()),
            ("append".to_string(), "true".to_string()),
        ]))
        .unwrap();
        assert!(config.append);
    }
}
