//! The WebSocket uplink to the collector.
//!
//! One `select!` loop multiplexes four concerns over a single connection:
//! transmitting queued batches, receiving ACKs and target-list pushes, the
//! once-per-second requeue sweep, and shutdown. When the connection dies
//! the supervisor loop backs off, requeues everything in flight, and
//! reconnects.

use crate::uplink::{Uplink, REQUEUE_INTERVAL};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use pingfleet_icmp::EngineHandle;
use pingfleet_proto::{Clock, FromProber, Output, ProbeKind, ToProber};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

pub const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(1);
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);
/// Grace period for in-flight ACKs on shutdown.
pub const SHUTDOWN_DRAIN: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("connection closed by collector")]
    Closed,
}

pub struct Transport {
    url: String,
    prober_name: String,
    uplink: Uplink,
    queue_tx: mpsc::UnboundedSender<Output>,
    queue_rx: mpsc::UnboundedReceiver<Output>,
    engine: EngineHandle,
    shutdown: watch::Receiver<bool>,
}

impl Transport {
    pub fn new(
        url: String,
        prober_name: String,
        clock: Arc<dyn Clock>,
        queue_tx: mpsc::UnboundedSender<Output>,
        queue_rx: mpsc::UnboundedReceiver<Output>,
        engine: EngineHandle,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            url,
            prober_name,
            uplink: Uplink::new(clock),
            queue_tx,
            queue_rx,
            engine,
            shutdown,
        }
    }

    /// Supervisor: connect, serve, and on any failure requeue in-flight
    /// batches and reconnect with exponential backoff. Returns only on
    /// shutdown.
    pub async fn run(&mut self) {
        let mut delay = INITIAL_RECONNECT_DELAY;
        while !*self.shutdown.borrow() {
            info!(url = %self.url, "connecting to collector");
            match connect_async(self.url.as_str()).await {
                Ok((ws, _)) => {
                    delay = INITIAL_RECONNECT_DELAY;
                    match self.run_connection(ws).await {
                        Ok(()) => break, // clean shutdown
                        Err(e) => warn!(error = %e, "connection lost"),
                    }
                }
                Err(e) => warn!(error = %e, "connect failed"),
            }
            for message in self.uplink.take_unconfirmed() {
                let _ = self.queue_tx.send(message);
            }
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.changed() => break,
            }
            delay = (delay * 2).min(MAX_RECONNECT_DELAY);
        }
        info!("transport stopped");
    }

    async fn run_connection(&mut self, ws: WsStream) -> Result<(), TransportError> {
        let (mut sink, mut stream) = ws.split();

        // Auth is always the first frame.
        let auth = FromProber::Auth {
            name: self.prober_name.clone(),
        };
        sink.send(Message::Text(serde_json::to_string(&auth)?)).await?;
        info!(name = %self.prober_name, "sent auth");

        let mut requeue = tokio::time::interval(REQUEUE_INTERVAL);
        requeue.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_frame(&text),
                    Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed),
                    Some(Ok(_)) => {} // binary/ping/pong frames are not part of the protocol
                    Some(Err(e)) => return Err(e.into()),
                },
                batch = self.queue_rx.recv() => {
                    if let Some(message) = batch {
                        self.transmit(&mut sink, message).await?;
                    }
                }
                _ = requeue.tick() => {
                    for message in self.uplink.requeue_expired() {
                        debug!(id = ?message.id, "requeueing unacknowledged batch");
                        let _ = self.queue_tx.send(message);
                    }
                }
                _ = self.shutdown.changed() => {
                    self.drain(&mut stream).await;
                    return Ok(());
                }
            }
        }
    }

    async fn transmit(
        &mut self,
        sink: &mut SplitSink<WsStream, Message>,
        message: Output,
    ) -> Result<(), TransportError> {
        let message = self.uplink.prepare_transmit(message);
        debug!(id = ?message.id, replies = message.replies.len(), "transmitting batch");
        let text = serde_json::to_string(&FromProber::Output(message))?;
        sink.send(Message::Text(text)).await?;
        Ok(())
    }

    fn handle_frame(&mut self, text: &str) {
        match serde_json::from_str::<ToProber>(text) {
            Ok(ToProber::OutputAck { id, .. }) => {
                let removed = self.uplink.on_ack(id);
                debug!(id, removed, "output acknowledged");
            }
            Ok(ToProber::TargetList { targets }) => {
                let destinations: Vec<_> = targets
                    .iter()
                    .filter(|t| t.kind == ProbeKind::Icmp)
                    .map(|t| t.ip)
                    .collect();
                info!(count = destinations.len(), "received target list");
                self.engine.set_destinations(destinations);
            }
            Err(e) => warn!(error = %e, "unparseable frame from collector"),
        }
    }

    /// Give in-flight ACKs a short window to land before tearing down.
    async fn drain(&mut self, stream: &mut SplitStream<WsStream>) {
        let deadline = tokio::time::Instant::now() + SHUTDOWN_DRAIN;
        while self.uplink.unconfirmed_len() > 0 {
            match tokio::time::timeout_at(deadline, stream.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => self.handle_frame(&text),
                Ok(Some(Ok(_))) => {}
                Ok(Some(Err(_))) | Ok(None) | Err(_) => break,
            }
        }
        if self.uplink.unconfirmed_len() > 0 {
            warn!(
                pending = self.uplink.unconfirmed_len(),
                "shutting down with unacknowledged batches"
            );
        }
    }
}
