//! The raw-socket cadence engine.

use crate::packet::{self, MAX_RECV};
use crate::tick::TickState;
use crate::{IcmpError, TickBatch};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::mem::MaybeUninit;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

pub const DEFAULT_TIMEOUT_MS: u64 = 500;
pub const DEFAULT_PACKET_SIZE: usize = 55;
const TICK_INTERVAL: Duration = Duration::from_secs(1);

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Receives each completed tick's batch; the seam between the engine thread
/// and the transport's queue.
pub trait BatchSink: Send {
    fn emit(&self, batch: TickBatch);
}

impl<F: Fn(TickBatch) + Send> BatchSink for F {
    fn emit(&self, batch: TickBatch) {
        self(batch)
    }
}

/// Shared control surface for a running engine. Reconfiguration lands at
/// the next tick boundary; shutdown at the next natural boundary.
#[derive(Debug, Clone, Default)]
pub struct EngineHandle {
    stop: Arc<AtomicBool>,
    pending_destinations: Arc<Mutex<Option<Vec<Ipv4Addr>>>>,
}

impl EngineHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the destination set at the next tick boundary. An iteration
    /// already in progress completes with its prior set.
    pub fn set_destinations(&self, destinations: Vec<Ipv4Addr>) {
        *self.pending_destinations.lock().unwrap() = Some(destinations);
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    fn take_reconfiguration(&self) -> Option<Vec<Ipv4Addr>> {
        self.pending_destinations.lock().unwrap().take()
    }
}

/// Owns the raw socket and drives the 1 Hz send/receive cadence.
pub struct Engine {
    socket: Socket,
    destinations: Vec<Ipv4Addr>,
    timeout: Duration,
    packet_size: usize,
    own_id: u16,
    seq: u16,
    handle: EngineHandle,
}

impl Engine {
    /// Open the raw socket and prepare a cadence engine. Fails with
    /// [`IcmpError::Privilege`] when the process lacks `CAP_NET_RAW`.
    pub fn new(
        destinations: Vec<Ipv4Addr>,
        timeout_ms: u64,
        packet_size: usize,
    ) -> Result<Self, IcmpError> {
        let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4)).map_err(|e| {
            if e.kind() == io::ErrorKind::PermissionDenied {
                IcmpError::Privilege(e)
            } else {
                IcmpError::Io(e)
            }
        })?;
        let own_id = (std::process::id() & 0xffff) as u16;
        info!(own_id, timeout_ms, packet_size, "opened raw ICMP socket");
        Ok(Self {
            socket,
            destinations,
            timeout: Duration::from_millis(timeout_ms),
            packet_size,
            own_id,
            seq: 0,
            handle: EngineHandle::new(),
        })
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Drive ticks until the handle's stop flag is raised. Each iteration
    /// starts on a whole-second boundary; overruns are logged but never
    /// skip a tick.
    pub fn run(mut self, sink: &dyn BatchSink) {
        let start = Instant::now();
        let mut iteration: u32 = 0;
        while !self.handle.is_stopped() {
            if let Some(fresh) = self.handle.take_reconfiguration() {
                info!(count = fresh.len(), "destination set reconfigured");
                self.destinations = fresh;
            }
            iteration += 1;
            if !self.destinations.is_empty() {
                let batch = self.run_tick();
                sink.emit(batch);
            }
            self.seq = self.seq.wrapping_add(1);

            let next = start + TICK_INTERVAL * iteration;
            let now = Instant::now();
            if next > now {
                std::thread::sleep(next - now);
            } else {
                warn!(
                    behind_ms = (now - next).as_millis() as u64,
                    "iteration took longer than one second"
                );
            }
        }
        info!("ping cadence loop exited");
    }

    fn run_tick(&mut self) -> TickBatch {
        let send_time = unix_now();
        let request = packet::build_echo_request(self.own_id, self.seq, self.packet_size);
        for destination in &self.destinations {
            let addr = SockAddr::from(SocketAddrV4::new(*destination, 0));
            if let Err(e) = self.socket.send_to(&request, &addr) {
                warn!(dst = %destination, error = %e, "echo request send failed");
            }
        }
        let mut tick = TickState::new(self.own_id, self.seq, send_time, &self.destinations);
        let deadline = Instant::now() + self.timeout;
        self.collect_replies(&mut tick, deadline);
        tick.finish()
    }

    /// Read replies until every destination answered or the window closes.
    fn collect_replies(&mut self, tick: &mut TickState, deadline: Instant) {
        let mut buf = [MaybeUninit::<u8>::uninit(); MAX_RECV];
        while !tick.all_replied() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            if let Err(e) = self.socket.set_read_timeout(Some(remaining)) {
                warn!(error = %e, "failed to arm receive timeout");
                break;
            }
            match self.socket.recv_from(&mut buf) {
                Ok((len, _)) => {
                    let receive_time = unix_now();
                    // recv_from initialized the first `len` bytes.
                    let datagram =
                        unsafe { std::slice::from_raw_parts(buf.as_ptr().cast::<u8>(), len) };
                    match packet::parse_echo_reply(datagram) {
                        Some(reply) => {
                            if !tick.accept(&reply, receive_time) {
                                debug!(src = %reply.source, seq = reply.sequence, "ignored reply outside this tick");
                            }
                        }
                        None => debug!(len, "ignored non-echo-reply datagram"),
                    }
                }
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    break;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, "receive failure");
                    break;
                }
            }
        }
    }
}
