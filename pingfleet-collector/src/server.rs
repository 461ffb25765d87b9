//! WebSocket listener and per-client session handling.
//!
//! Session lifecycle: the first frame must be `auth`; an empty, unknown or
//! already-connected name closes the socket before any data is read. After
//! auth the session pushes the prober's target list, then streams: each
//! `output` frame is decorated, enqueued for the writer, and ACKed.

use crate::CollectorError;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use pingfleet_proto::{FromProber, Output, TargetSpec, ToProber};
use pingfleet_store::Catalog;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::mpsc::Sender as QueueSender;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

/// Connected probers keyed by authenticated name. Each session registers an
/// outbound sender so target lists can be pushed from the control poll.
pub type Clients = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<ToProber>>>>;

type WsStream = WebSocketStream<TcpStream>;

/// Accept loop: one spawned session task per inbound connection.
pub async fn run<C: Catalog + 'static>(
    listener: TcpListener,
    catalog: Arc<C>,
    clients: Clients,
    write_tx: QueueSender<Output>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let catalog = catalog.clone();
                let clients = clients.clone();
                let write_tx = write_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, peer, catalog, clients, write_tx).await
                    {
                        debug!(peer = %peer, error = %e, "session ended with error");
                    }
                });
            }
            Err(e) => warn!(error = %e, "accept failed"),
        }
    }
}

/// Validate the first frame of a connection. `None` means the connection
/// must be closed without reading anything further.
pub fn validate_auth<C: Catalog + ?Sized>(
    catalog: &C,
    text: &str,
) -> Result<Option<String>, CollectorError> {
    let message = match serde_json::from_str::<FromProber>(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "unparseable first frame");
            return Ok(None);
        }
    };
    let FromProber::Auth { name } = message else {
        warn!("first frame was not an auth message");
        return Ok(None);
    };
    if name.is_empty() {
        warn!("auth with blank prober name");
        return Ok(None);
    }
    if catalog.get_prober(&name)?.is_none() {
        warn!(name = %name, "auth from unknown prober");
        return Ok(None);
    }
    Ok(Some(name))
}

/// Handle one streaming frame. Returns the ACK to send back, if any.
pub fn handle_client_frame(
    name: &str,
    peer: &SocketAddr,
    text: &str,
    write_tx: &QueueSender<Output>,
) -> Option<ToProber> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!(name = %name, error = %e, "malformed JSON frame, dropping");
            return None;
        }
    };
    match value.get("type").and_then(|t| t.as_str()) {
        Some("output") => {
            let mut output: Output = match serde_json::from_value(value) {
                Ok(output) => output,
                Err(e) => {
                    warn!(name = %name, error = %e, "malformed output message, dropping");
                    return None;
                }
            };
            let Some(id) = output.id else {
                warn!(name = %name, "output message without id, dropping");
                return None;
            };
            output.remote_ip = Some(peer.ip().to_string());
            output.prober_name = Some(name.to_string());
            if write_tx.send(output).is_err() {
                error!("write queue is gone, dropping output");
                return None;
            }
            Some(ToProber::OutputAck {
                status: "enqueued".into(),
                id,
            })
        }
        Some(other) => {
            warn!(name = %name, message_type = other, "unknown message type, ignoring");
            None
        }
        None => {
            warn!(name = %name, "message without a type field, ignoring");
            None
        }
    }
}

async fn send_message(
    sink: &mut SplitSink<WsStream, Message>,
    message: &ToProber,
) -> Result<(), CollectorError> {
    let text = serde_json::to_string(message)?;
    sink.send(Message::Text(text)).await?;
    Ok(())
}

async fn handle_connection<C: Catalog>(
    stream: TcpStream,
    peer: SocketAddr,
    catalog: Arc<C>,
    clients: Clients,
    write_tx: QueueSender<Output>,
) -> Result<(), CollectorError> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    info!(peer = %peer, "new connection");
    let (mut sink, mut stream) = ws.split();

    // NEW state: nothing counts until a valid auth frame.
    let first = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => break text,
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            _ => {
                debug!(peer = %peer, "connection ended before auth");
                return Ok(());
            }
        }
    };
    let Some(name) = validate_auth(catalog.as_ref(), &first)? else {
        let _ = sink.close().await;
        return Ok(());
    };

    let (out_tx, out_rx) = mpsc::unbounded_channel();
    {
        let mut table = clients.lock().await;
        if table.contains_key(&name) {
            warn!(peer = %peer, name = %name, "prober already connected, closing");
            let _ = sink.close().await;
            return Ok(());
        }
        table.insert(name.clone(), out_tx);
    }
    info!(peer = %peer, name = %name, "prober authenticated");

    let result = serve_session(
        &name, peer, sink, stream, out_rx, catalog, write_tx,
    )
    .await;
    clients.lock().await.remove(&name);
    info!(peer = %peer, name = %name, "prober disconnected");
    result
}

async fn serve_session<C: Catalog>(
    name: &str,
    peer: SocketAddr,
    mut sink: SplitSink<WsStream, Message>,
    mut stream: futures_util::stream::SplitStream<WsStream>,
    mut out_rx: mpsc::UnboundedReceiver<ToProber>,
    catalog: Arc<C>,
    write_tx: QueueSender<Output>,
) -> Result<(), CollectorError> {
    let targets = catalog.targets_for(name)?;
    if targets.is_empty() {
        warn!(name = %name, "no targets configured for prober, closing");
        let _ = sink.close().await;
        return Ok(());
    }
    let push = ToProber::TargetList {
        targets: targets.iter().map(TargetSpec::from).collect(),
    };
    send_message(&mut sink, &push).await?;

    // STREAMING state.
    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Some(ack) = handle_client_frame(name, &peer, &text, &write_tx) {
                        send_message(&mut sink, &ack).await?;
                    }
                }
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            },
            push = out_rx.recv() => {
                if let Some(message) = push {
                    send_message(&mut sink, &message).await?;
                }
            }
        }
    }
}
