//! ## portvakt-engine::relay
//! **Single consumer of the capture → service handoff**
//!
//! Pulls persisted records off the handoff channel and fans each one out
//! through the hub. Ends when every producer is gone and the queue is empty.

use std::sync::Arc;

use portvakt_core::{BroadcastHub, HandoffReceiver};
use portvakt_telemetry::MetricsRecorder;
use tracing::{debug, error, info, instrument};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub relayed: u64,
    pub evicted: u64,
}

#[instrument(level = "debug", name = "relay", skip_all)]
pub async fn run_relay(
    mut handoff: HandoffReceiver,
    hub: Arc<BroadcastHub>,
    metrics: Arc<MetricsRecorder>,
) -> RelayStats {
    let mut stats = RelayStats::default();

    while let Some(record) = handoff.recv().await {
        let report = match hub.broadcast(&record) {
            Ok(report) => report,
            Err(e) => {
                error!(id = record.id, error = %e, "alert could not be encoded for subscribers");
                continue;
            }
        };

        stats.relayed += 1;
        metrics.broadcasts.inc();
        debug!(id = record.id, delivered = report.delivered, "alert relayed");

        if !report.evicted.is_empty() {
            let evicted = report.evicted.len() as u64;
            stats.evicted += evicted;
            metrics.subscriber_evictions.inc_by(evicted);
            metrics.subscribers.set(hub.len() as i64);
            for id in &report.evicted {
                info!(subscriber = %id, "subscriber evicted after failed delivery");
            }
        }
    }

    debug!(relayed = stats.relayed, "handoff closed, relay stopping");
    stats
}
