//! Collector process configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Bind address for the WebSocket listener.
    pub ws_address: String,
    pub ws_port: u16,
    pub log_file: String,
    /// SQLite catalog database path.
    pub catalog_path: String,
    pub storage: StorageConfig,
}

/// Which TSDB backend the writer records into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// One binary ring-buffer datafile per pair, under `data_dir`.
    Binary { data_dir: String },
    /// A single SQLite samples database.
    Sqlite { path: String },
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            ws_address: "localhost".into(),
            ws_port: 8765,
            log_file: "collector.log".into(),
            catalog_path: "catalog.sqlite3".into(),
            storage: StorageConfig::Binary {
                data_dir: "data".into(),
            },
        }
    }
}

/// Load configuration, falling back to defaults when the file is missing or
/// unparseable.
pub fn load_config(path: &Path) -> CollectorConfig {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|data| serde_json::from_str(&data).ok())
        .unwrap_or_default()
}
