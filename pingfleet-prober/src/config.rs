//! Prober process configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProberConfig {
    /// Collector WebSocket URL.
    pub ws_url: String,
    /// This vantage point's registered name.
    pub prober_name: String,
    pub log_file: String,
    /// Reply window per tick, milliseconds.
    pub timeout_ms: u64,
    /// ICMP payload size in bytes.
    pub packet_size: usize,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:8765/".into(),
            prober_name: "prober".into(),
            log_file: "prober.log".into(),
            timeout_ms: 500,
            packet_size: 55,
        }
    }
}

/// Load configuration, falling back to defaults when the file is missing or
/// unparseable.
pub fn load_config(path: &Path) -> ProberConfig {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|data| serde_json::from_str(&data).ok())
        .unwrap_or_default()
}
