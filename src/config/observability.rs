//! Where the daemon's own diagnostics go
//!
//! Audit records live in SQLite; this only covers tracing output. Stdout
//! always gets human-readable lines. With `file_enabled` the same events are
//! also written as JSON traces of the audit pipeline (classification,
//! correlation misses, store failures) for later inspection.

use serde::Deserialize;
use std::path::PathBuf;

/// How often the JSON trace file rolls over
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LogRotation {
    Hourly,
    #[default]
    Daily,
    /// One file that grows forever
    Never,
}

impl LogRotation {
    /// Unknown values fall back to daily
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "hourly" => Self::Hourly,
            "never" => Self::Never,
            _ => Self::Daily,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Never => "never",
        }
    }
}

/// Resolved `[logging]` section
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset; `debug` shows every classified request
    pub level: String,
    /// Write pipeline traces as JSON next to the stdout output
    pub file_enabled: bool,
    /// Created at startup if missing
    pub file_dir: PathBuf,
    /// How often the JSON trace file rolls over
    pub file_rotation: LogRotation,
    /// File name stem; the appender adds the date suffix
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_enabled: false,
            file_dir: PathBuf::from("./logs"),
            file_rotation: LogRotation::Daily,
            file_prefix: "slack-audit".to_string(),
        }
    }
}

/// `[logging]` as written in config.toml; every key optional
#[derive(Debug, Deserialize, Default)]
pub struct FileLogging {
    pub level: Option<String>,
    pub file_enabled: Option<bool>,
    pub file_dir: Option<String>,
    pub file_rotation: Option<String>,
    pub file_prefix: Option<String>,
}

impl LoggingConfig {
    pub fn from_file(file: Option<FileLogging>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        Self {
            level: file.level.unwrap_or(defaults.level),
            file_enabled: file.file_enabled.unwrap_or(defaults.file_enabled),
            file_dir: file
                .file_dir
                .map(PathBuf::from)
                .unwrap_or(defaults.file_dir),
            file_rotation: file
                .file_rotation
                .map(|s| LogRotation::from_str(&s))
                .unwrap_or(defaults.file_rotation),
            file_prefix: file.file_prefix.unwrap_or(defaults.file_prefix),
        }
    }
}
