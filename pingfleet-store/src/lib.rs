//! # Pingfleet Store
//!
//! The collector's storage collaborators behind trait seams: the relational
//! [`Catalog`] of probers/targets/groups, the [`ControlQueue`] the web UI
//! posts administrative requests through, and the [`Tsdb`] sample store.
//! Two TSDB implementations ship: binary ring-buffer datafiles and SQLite.

pub mod catalog;
pub mod schema;
pub mod tsdb_datafile;
pub mod tsdb_sqlite;

use pingfleet_proto::{ControlKind, ControlMessage, Prober, Target};
use std::net::Ipv4Addr;
use thiserror::Error;

pub use catalog::SqliteCatalog;
pub use tsdb_datafile::DatafileTsdb;
pub use tsdb_sqlite::SqliteTsdb;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Datafile(#[from] pingfleet_datafile::DatafileError),
    #[error("invalid IPv4 address in store: {0}")]
    BadAddress(String),
    #[error("unknown control message kind {0}")]
    UnknownControlKind(i64),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Read-mostly view of the relational catalog.
pub trait Catalog: Send + Sync {
    fn get_prober(&self, name: &str) -> Result<Option<Prober>, StoreError>;
    /// Union of the targets of every probe group the prober belongs to.
    fn targets_for(&self, prober_name: &str) -> Result<Vec<Target>, StoreError>;
    /// Every registered `(prober, destination)` time series.
    fn pairs(&self) -> Result<Vec<Pair>, StoreError>;
}

/// The admin-to-collector message table.
pub trait ControlQueue: Send + Sync {
    /// Fetch unread messages, atomically marking them read.
    fn get_unread(&self) -> Result<Vec<ControlMessage>, StoreError>;
    /// Post a message for the collector; the web UI's side of the table.
    fn post(&self, kind: ControlKind) -> Result<(), StoreError>;
}

/// A registered `(prober, destination)` time series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub id: i64,
    pub prober_name: String,
    pub dst_ip: Ipv4Addr,
    /// Datafile path for the binary backend; unset for relational backends.
    pub datafile: Option<String>,
}

/// Time-series sample store.
///
/// `record` is keyed on `(prober_name, dst_ip, send_time)`; implementations
/// should be idempotent on that key since delivery is at-least-once.
pub trait Tsdb: Send {
    fn record(
        &mut self,
        prober_name: &str,
        dst_ip: Ipv4Addr,
        send_time: f64,
        receive_time: Option<f64>,
    ) -> Result<(), StoreError>;

    /// Samples with `start <= epoch <= end` in time order; `None` latency is
    /// a timeout.
    fn query(
        &mut self,
        prober_name: &str,
        dst_ip: Ipv4Addr,
        start: u32,
        end: u32,
    ) -> Result<Vec<(u32, Option<f64>)>, StoreError>;

    fn last_time(&mut self, prober_name: &str, dst_ip: Ipv4Addr)
        -> Result<Option<u32>, StoreError>;

    fn count(&mut self, prober_name: &str, dst_ip: Ipv4Addr) -> Result<u64, StoreError>;
}
