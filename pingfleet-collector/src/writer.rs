//! The TSDB writer worker.

use pingfleet_proto::Output;
use pingfleet_store::Tsdb;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Queue pop timeout, so the stop flag is observed promptly.
pub const POP_TIMEOUT: Duration = Duration::from_millis(500);

/// Drains the write queue into the TSDB on a dedicated OS thread, keeping
/// slow storage off the WebSocket receive path. One inbound batch expands
/// to one TSDB write per reply.
pub struct Writer {
    tsdb: Box<dyn Tsdb>,
    queue: Receiver<Output>,
    stop: Arc<AtomicBool>,
}

impl Writer {
    pub fn new(tsdb: Box<dyn Tsdb>, queue: Receiver<Output>, stop: Arc<AtomicBool>) -> Self {
        Self { tsdb, queue, stop }
    }

    pub fn run(mut self) {
        info!("database writer started");
        while !self.stop.load(Ordering::Relaxed) {
            match self.queue.recv_timeout(POP_TIMEOUT) {
                Ok(message) => self.store_output(&message),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!("database writer exited");
    }

    fn store_output(&mut self, message: &Output) {
        let Some(name) = message.prober_name.as_deref() else {
            warn!("write-queue message missing prober name, dropping");
            return;
        };
        for (dst_ip, receive_time) in &message.replies {
            self.record_with_retry(name, *dst_ip, message.send_time, *receive_time);
        }
    }

    /// One retry before dropping; the fabric is best-effort past the ACK
    /// boundary.
    fn record_with_retry(
        &mut self,
        name: &str,
        dst_ip: Ipv4Addr,
        send_time: f64,
        receive_time: Option<f64>,
    ) {
        if let Err(first) = self.tsdb.record(name, dst_ip, send_time, receive_time) {
            warn!(prober = name, dst = %dst_ip, error = %first, "TSDB write failed, retrying");
            if let Err(second) = self.tsdb.record(name, dst_ip, send_time, receive_time) {
                error!(prober = name, dst = %dst_ip, error = %second, "TSDB write failed twice, dropping sample");
            }
        }
    }
}
