//! JSON wire messages carried over the prober/collector WebSocket.
//!
//! Every frame is a text frame holding one internally-tagged JSON object;
//! the `type` field selects the message.

use crate::model::{ProbeKind, Target};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// One `(destination, receive time)` pair within a result batch. A missing
/// receive time means the destination timed out that tick.
pub type Reply = (Ipv4Addr, Option<f64>);

/// One tick's results, as carried on the wire and through the prober's
/// queues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    /// At-least-once delivery nonce. Assigned on first transmission and
    /// kept across retransmissions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Wall time the tick's echo requests were sent, UNIX seconds.
    pub send_time: f64,
    pub replies: Vec<Reply>,
    /// Wall time of the most recent transmission of this batch.
    #[serde(default)]
    pub message_transmit_time: f64,
    /// Filled in by the collector from the connection's peer address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_ip: Option<String>,
    /// Filled in by the collector from the session's authenticated name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prober_name: Option<String>,
}

/// Messages travelling prober to collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FromProber {
    /// Must be the first frame on every connection.
    Auth { name: String },
    Output(Output),
}

/// One entry of a `target_list` push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub ip: Ipv4Addr,
    #[serde(rename = "type")]
    pub kind: ProbeKind,
    pub port: Option<u16>,
}

impl From<&Target> for TargetSpec {
    fn from(target: &Target) -> Self {
        Self {
            ip: target.ip,
            kind: target.kind,
            port: target.port,
        }
    }
}

/// Messages travelling collector to prober.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToProber {
    /// The prober's current target set; pushed after auth and whenever the
    /// catalog asks for a refresh.
    TargetList { targets: Vec<TargetSpec> },
    /// Acknowledges one `output` batch by nonce.
    OutputAck { status: String, id: u64 },
}
