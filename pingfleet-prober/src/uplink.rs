//! At-least-once delivery bookkeeping, independent of any live connection.

use pingfleet_proto::{Clock, Output};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long a transmitted batch may wait for its ACK before it is requeued.
pub const MESSAGE_ACK_TIMEOUT: Duration = Duration::from_secs(5);
/// Cadence of the requeue sweep.
pub const REQUEUE_INTERVAL: Duration = Duration::from_secs(1);

const NONCE_BITS: u32 = 40;

#[derive(Debug, Clone)]
struct Unconfirmed {
    message: Output,
    transmitted_at: Instant,
}

/// Nonce assignment, the unconfirmed list, and the requeue sweep.
///
/// Owned by the transport's event loop; nothing here is shared across
/// threads.
pub struct Uplink {
    clock: Arc<dyn Clock>,
    next_nonce: u64,
    unconfirmed: Vec<Unconfirmed>,
}

impl Uplink {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let mut rng = StdRng::from_entropy();
        let first_nonce = rng.gen_range(0..1u64 << NONCE_BITS);
        Self::with_nonce(clock, first_nonce)
    }

    pub fn with_nonce(clock: Arc<dyn Clock>, first_nonce: u64) -> Self {
        Self {
            clock,
            next_nonce: first_nonce,
            unconfirmed: Vec::new(),
        }
    }

    /// Stamp a batch for transmission: assign its nonce (first transmission
    /// only — retransmissions keep their id), refresh
    /// `message_transmit_time`, and track it as unconfirmed.
    pub fn prepare_transmit(&mut self, mut message: Output) -> Output {
        if message.id.is_none() {
            message.id = Some(self.next_nonce);
            self.next_nonce += 1;
        }
        message.message_transmit_time = self.clock.now_unix();
        self.unconfirmed.push(Unconfirmed {
            message: message.clone(),
            transmitted_at: self.clock.now_instant(),
        });
        message
    }

    /// Drop every unconfirmed entry matching the acknowledged id; returns
    /// how many were removed.
    pub fn on_ack(&mut self, id: u64) -> usize {
        let before = self.unconfirmed.len();
        self.unconfirmed.retain(|entry| entry.message.id != Some(id));
        before - self.unconfirmed.len()
    }

    /// Partition the unconfirmed list by age: entries past
    /// [`MESSAGE_ACK_TIMEOUT`] are handed back for retransmission, the rest
    /// stay. Every entry lands on exactly one side.
    pub fn requeue_expired(&mut self) -> Vec<Output> {
        let now = self.clock.now_instant();
        let (expired, kept): (Vec<_>, Vec<_>) =
            self.unconfirmed.drain(..).partition(|entry| {
                now.saturating_duration_since(entry.transmitted_at) >= MESSAGE_ACK_TIMEOUT
            });
        self.unconfirmed = kept;
        expired.into_iter().map(|entry| entry.message).collect()
    }

    /// Pull every unconfirmed entry; used when a connection dies so the
    /// batches go back to the result queue immediately.
    pub fn take_unconfirmed(&mut self) -> Vec<Output> {
        self.unconfirmed
            .drain(..)
            .map(|entry| entry.message)
            .collect()
    }

    pub fn unconfirmed_len(&self) -> usize {
        self.unconfirmed.len()
    }

    pub fn next_nonce(&self) -> u64 {
        self.next_nonce
    }
}
