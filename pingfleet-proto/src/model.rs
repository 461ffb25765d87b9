//! Catalog data model shared by the collector and its stores.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Probe types the data model understands. Only ICMP echo is driven today;
/// the wire format leaves room for more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    Icmp,
}

/// A measurement destination from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub ip: Ipv4Addr,
    pub kind: ProbeKind,
    pub port: Option<u16>,
}

/// A registered vantage point. Identity is the unique name; `key` is
/// reserved for future authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prober {
    pub id: i64,
    pub name: String,
    pub key: String,
    /// UNIX seconds of registration.
    pub added: i64,
}

/// Administrative requests posted through the control queue for the
/// collector to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    ReloadSettings,
    NotifyProbers,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMessage {
    pub id: i64,
    pub kind: ControlKind,
    /// UNIX seconds the message was posted.
    pub posted: i64,
}
