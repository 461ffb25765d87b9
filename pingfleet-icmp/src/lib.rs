//! # Pingfleet ICMP
//!
//! The prober's echo engine: a 1 Hz cadence of ICMP echo requests over one
//! raw IPv4 socket, with replies multiplexed back onto their tick by
//! `(identifier, sequence)`.
//!
//! The crate is split so everything except the socket itself is pure:
//! [`packet`] builds and parses the wire bytes, [`tick`] tracks one
//! iteration's pending destinations, and [`engine`] owns the raw socket and
//! the cadence loop.

pub mod engine;
pub mod packet;
pub mod tick;

use thiserror::Error;

pub use engine::{BatchSink, Engine, EngineHandle};
pub use packet::{EchoReply, checksum};
pub use tick::TickState;

/// One cadence iteration's results, handed to the transport layer.
#[derive(Debug, Clone, PartialEq)]
pub struct TickBatch {
    /// Wall time the tick's requests went out, UNIX seconds.
    pub send_time: f64,
    /// Exactly one entry per destination, replies first in arrival order,
    /// then timeouts in destination order.
    pub replies: Vec<pingfleet_proto::Reply>,
}

#[derive(Debug, Error)]
pub enum IcmpError {
    /// Raw ICMP sockets need CAP_NET_RAW (or root); fatal at startup.
    #[error("cannot open raw ICMP socket (requires elevated privileges): {0}")]
    Privilege(std::io::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
