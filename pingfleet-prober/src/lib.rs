//! # Pingfleet Prober
//!
//! The vantage-point process: the ICMP engine runs on its own OS thread and
//! feeds result batches through a queue into the [`transport`], which owns
//! the WebSocket to the collector and guarantees at-least-once delivery via
//! the [`uplink`] bookkeeping.

pub mod config;
pub mod transport;
pub mod uplink;

pub use config::{load_config, ProberConfig};
pub use transport::{Transport, TransportError};
pub use uplink::Uplink;
