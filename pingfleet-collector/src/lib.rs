//! # Pingfleet Collector
//!
//! The central ingestion server: accepts prober WebSocket connections,
//! validates identities against the catalog, pushes target lists, ACKs and
//! enqueues result batches, and drains the write queue into the TSDB on a
//! dedicated writer thread. A periodic poll of the control queue re-pushes
//! target lists when the web UI asks for it.

pub mod config;
pub mod control;
pub mod server;
pub mod writer;

use thiserror::Error;

pub use config::{load_config, CollectorConfig, StorageConfig};
pub use server::Clients;
pub use writer::Writer;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] pingfleet_store::StoreError),
}
