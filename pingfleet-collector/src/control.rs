//! Periodic control-queue poll.
//!
//! The web UI posts administrative requests into the catalog's message
//! queue; the collector polls it and reacts. `NotifyProbers` re-evaluates
//! every connected prober's target set and pushes a fresh `target_list`
//! (broadcast: probers whose membership did not change also get one).

use crate::server::Clients;
use pingfleet_proto::{ControlKind, TargetSpec, ToProber};
use pingfleet_store::{Catalog, ControlQueue};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

pub const CONTROL_POLL_INTERVAL: Duration = Duration::from_secs(10);

pub async fn run<C>(catalog: Arc<C>, clients: Clients, mut shutdown: watch::Receiver<bool>)
where
    C: Catalog + ControlQueue,
{
    let mut tick = tokio::time::interval(CONTROL_POLL_INTERVAL);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = tick.tick() => poll_once(catalog.as_ref(), &clients).await,
            _ = shutdown.changed() => break,
        }
    }
    info!("control poll stopped");
}

pub async fn poll_once<C>(catalog: &C, clients: &Clients)
where
    C: Catalog + ControlQueue + ?Sized,
{
    let messages = match catalog.get_unread() {
        Ok(messages) => messages,
        Err(e) => {
            warn!(error = %e, "control queue poll failed");
            return;
        }
    };
    for message in messages {
        match message.kind {
            ControlKind::NotifyProbers => {
                info!(id = message.id, "notify-probers requested");
                notify_probers(catalog, clients).await;
            }
            ControlKind::ReloadSettings => {
                info!(id = message.id, "reload-settings requested, nothing to reload");
            }
        }
    }
}

/// Push a freshly computed target list to every connected prober.
pub async fn notify_probers<C: Catalog + ?Sized>(catalog: &C, clients: &Clients) {
    let table = clients.lock().await;
    for (name, out_tx) in table.iter() {
        match catalog.targets_for(name) {
            Ok(targets) => {
                let push = ToProber::TargetList {
                    targets: targets.iter().map(TargetSpec::from).collect(),
                };
                if out_tx.send(push).is_err() {
                    warn!(name = %name, "session outbound queue closed");
                } else {
                    info!(name = %name, count = targets.len(), "pushed refreshed target list");
                }
            }
            Err(e) => warn!(name = %name, error = %e, "target lookup failed"),
        }
    }
}
