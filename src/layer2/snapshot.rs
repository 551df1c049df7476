// Snapshot Timer - Periodic read-only state broadcast
// Keeps push consumers current even when no trades print

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::core::events::EventPayload;
use crate::core::types::{Bar, BookSnapshot, Tick};
use crate::layer2::ingest::now_ms;
use crate::layer2::pipeline::MarketHub;

/// Payload of the `snapshot_1s` push event
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot1s {
    pub symbol: String,
    pub server_ts: i64,
    pub last: Option<Tick>,
    pub stale_ms: Option<i64>,
    pub current_bar: Option<Bar>,
    pub book: Option<BookSnapshot>,
}

/// Publish one snapshot per registered symbol
pub fn publish_snapshots(hub: &MarketHub, server_ts: i64) -> usize {
    let mut published = 0;
    for pipeline in hub.pipelines() {
        let snapshot = pipeline.snapshot_1s(server_ts);
        hub.event_bus().publish_payload(EventPayload::Snapshot1s(snapshot));
        published += 1;
    }
    published
}

/// Spawn the snapshot timer; it exits once `shutdown` flips to true
pub fn spawn_snapshot_ticker(
    hub: Arc<MarketHub>,
    interval_ms: u64,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    publish_snapshots(&hub, now_ms());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("Snapshot ticker stopping");
                        break;
                    }
                }
            }
        }
    })
}
