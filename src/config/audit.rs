//! Audit configuration: where records go and how they are enriched

use serde::Deserialize;
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────────────────────
// Storage
// ─────────────────────────────────────────────────────────────────────────────

/// Audit log database settings
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// SQLite database file (parent directories are created on startup)
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/audit.db"),
        }
    }
}

/// Storage settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileStorage {
    pub db_path: Option<String>,
}

impl StorageConfig {
    /// Create from file config; an env override wins over the file
    pub fn from_file(file: Option<FileStorage>, db_path_override: Option<String>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        Self {
            db_path: db_path_override
                .or(file.db_path)
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Correlation
// ─────────────────────────────────────────────────────────────────────────────

/// Page lookup settings
#[derive(Debug, Clone)]
pub struct CorrelationConfig {
    /// Resolve channel names and reaction targets from the rendered page.
    /// When off, records are stored with only what the request carried.
    pub enabled: bool,
    /// Pending commands per tab before snapshot pushes wait
    pub mailbox_size: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mailbox_size: 32,
        }
    }
}

/// Correlation settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileCorrelation {
    pub enabled: Option<bool>,
    pub mailbox_size: Option<usize>,
}

impl CorrelationConfig {
    pub fn from_file(file: Option<FileCorrelation>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        Self {
            enabled: file.enabled.unwrap_or(defaults.enabled),
            mailbox_size: file.mailbox_size.unwrap_or(defaults.mailbox_size).max(1),
        }
    }
}
