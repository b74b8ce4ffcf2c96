use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use importer_engine::{ApiSettings, RunnerSettings};
use importer_logging::import_debug;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "contact_import.ron";

/// Settings read from the optional RON config file. Missing keys keep their
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_concurrent_rows: usize,
    pub row_delay_ms: u64,
    pub call_timeout_secs: u64,
    pub report_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        let api = ApiSettings::default();
        let runner = RunnerSettings::default();
        Self {
            base_url: api.base_url,
            connect_timeout_secs: api.connect_timeout.as_secs(),
            request_timeout_secs: api.request_timeout.as_secs(),
            max_concurrent_rows: runner.max_concurrent_rows,
            row_delay_ms: runner.row_delay.as_millis() as u64,
            call_timeout_secs: runner.call_timeout.as_secs(),
            report_path: PathBuf::from("import-errors.csv"),
        }
    }
}

impl AppConfig {
    /// Loads `path`, or `contact_import.ron` when no path is given. Only an
    /// explicitly named file has to exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if !required && err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("reading config {}", path.display()))
            }
        };

        let config = ron::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        import_debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.base_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            max_concurrent_rows: self.max_concurrent_rows.max(1),
            row_delay: Duration::from_millis(self.row_delay_ms),
            call_timeout: Duration::from_secs(self.call_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.max_concurrent_rows, 1);
        assert_eq!(config.row_delay_ms, 100);
        assert_eq!(config.call_timeout_secs, 30);
        assert_eq!(config.report_path, PathBuf::from("import-errors.csv"));
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.ron");
        fs::write(
            &path,
            r#"(base_url: "https://chat.example.com", max_concurrent_rows: 4)"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.base_url, "https://chat.example.com");
        assert_eq!(config.runner_settings().max_concurrent_rows, 4);
        assert_eq!(config.row_delay_ms, 100);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        assert!(AppConfig::load(Some(&temp.path().join("absent.ron"))).is_err());
    }

    #[test]
    fn zero_concurrency_still_runs_one_row() {
        let config = AppConfig {
            max_concurrent_rows: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.runner_settings().max_concurrent_rows, 1);
    }
}
