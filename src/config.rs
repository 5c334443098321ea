//! Optional TOML configuration.
//!
//! Looked up at `$HOME/.config/dedup/config.toml` unless `--config` names a
//! file. Every field has a default, so a partial file (or no file at all) is
//! valid. Command-line flags override whatever is loaded here.
//!
//! ```toml
//! [scan]
//! workers = 8
//! encoding = "binary"
//! report_interval_ms = 250
//!
//! [output]
//! format = "csv"
//! include_singletons = false
//!
//! [logging]
//! level = "debug"
//! log_to_file = true
//! log_file = "/tmp/dedup.log"
//! ```

use crate::error::{DedupError, Result};
use crate::hasher::DEFAULT_WORKERS;
use crate::progress::DEFAULT_REPORT_INTERVAL;
use crate::state::Encoding;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR_NAME: &str = "dedup";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Format of the exported duplicate report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Digest to paths map
    #[default]
    Json,
    /// One row per file
    Csv,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Hashing pool and scan state settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub workers: usize,
    pub encoding: Encoding,
    pub report_interval_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            encoding: Encoding::default(),
            report_interval_ms: DEFAULT_REPORT_INTERVAL.as_millis() as u64,
        }
    }
}

impl ScanConfig {
    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: ExportFormat,
    /// Also export digests seen only once
    pub include_singletons: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// error, warn, info, debug or trace
    pub level: String,
    pub log_to_file: bool,
    pub log_file: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_file: PathBuf::from("dedup.log"),
        }
    }
}

/// `$HOME/.config/dedup/config.toml`, if `HOME` is set
pub fn default_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME),
    )
}

impl Config {
    /// Loads and validates the file at `path`.
    ///
    /// # Errors
    /// [`DedupError::Config`] if the file is missing, unreadable, malformed
    /// or holds an invalid value.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| DedupError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
            .map_err(|e| DedupError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Loads the default config file, or returns defaults when there is none.
    pub fn load_default() -> Result<Self> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, String> {
        let config: Config = toml::from_str(content).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| DedupError::Config(e.to_string()))
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.scan.workers == 0 {
            return Err("scan.workers must be at least 1".to_string());
        }
        if self.scan.report_interval_ms == 0 {
            return Err("scan.report_interval_ms must be at least 1".to_string());
        }
        if self.logging.level.parse::<log::LevelFilter>().is_err() {
            return Err(format!("unknown logging.level '{}'", self.logging.level));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.scan.workers, DEFAULT_WORKERS);
        assert_eq!(config.scan.report_interval(), DEFAULT_REPORT_INTERVAL);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml(
            r#"
            [scan]
            encoding = "binary"

            [output]
            format = "csv"
            "#,
        )
        .unwrap();

        assert_eq!(config.scan.encoding, Encoding::Binary);
        assert_eq!(config.scan.workers, DEFAULT_WORKERS);
        assert_eq!(config.output.format, ExportFormat::Csv);
        assert!(!config.output.include_singletons);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Config::from_toml("[scan]\nworkers = 0").is_err());
        assert!(Config::from_toml("[logging]\nlevel = \"loud\"").is_err());
        assert!(Config::from_toml("[scan]\nencoding = \"xml\"").is_err());
    }

    #[test]
    fn test_load_from_file_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        let mut config = Config::default();
        config.scan.workers = 3;
        config.logging.level = "debug".to_string();
        fs::write(&path, config.to_toml().unwrap()).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = Config::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, DedupError::Config(_)));
    }
}
