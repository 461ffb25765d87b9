//! Per-tick reply correlation.

use crate::packet::EchoReply;
use crate::TickBatch;
use std::net::Ipv4Addr;

/// Correlation state for one cadence tick: which destinations still owe a
/// reply, and the identifier/sequence pair replies must carry to count.
#[derive(Debug)]
pub struct TickState {
    own_id: u16,
    seq: u16,
    send_time: f64,
    pending: Vec<Ipv4Addr>,
    replies: Vec<(Ipv4Addr, Option<f64>)>,
}

impl TickState {
    pub fn new(own_id: u16, seq: u16, send_time: f64, destinations: &[Ipv4Addr]) -> Self {
        Self {
            own_id,
            seq,
            send_time,
            pending: destinations.to_vec(),
            replies: Vec::with_capacity(destinations.len()),
        }
    }

    /// Offer a parsed reply; returns whether it was accepted for this tick.
    ///
    /// Packets with a foreign identifier, a stale sequence number, or a
    /// source that is not (or no longer) pending are ignored and do not
    /// consume the pending entry.
    pub fn accept(&mut self, reply: &EchoReply, receive_time: f64) -> bool {
        if reply.identifier != self.own_id || reply.sequence != self.seq {
            return false;
        }
        let Some(position) = self.pending.iter().position(|d| *d == reply.source) else {
            return false;
        };
        self.pending.remove(position);
        self.replies.push((reply.source, Some(receive_time)));
        true
    }

    pub fn all_replied(&self) -> bool {
        self.pending.is_empty()
    }

    /// Close the tick: every still-pending destination is recorded as a
    /// timeout, so each destination appears exactly once in the batch.
    pub fn finish(mut self) -> TickBatch {
        for destination in self.pending.drain(..) {
            self.replies.push((destination, None));
        }
        TickBatch {
            send_time: self.send_time,
            replies: self.replies,
        }
    }
}
