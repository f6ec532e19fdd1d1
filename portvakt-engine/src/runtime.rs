//! ## portvakt-engine::runtime
//! **Startup, steady state and shutdown of the monitor**
//!
//! Every startup-fatal step (metrics, packet source, storage, listener) runs
//! before the capture thread exists, so a failure leaves nothing to tear
//! down. Once running, the capture thread and the service tasks only meet at
//! the handoff channel.
//!
//! Shutdown order: stop capture and join its thread, which drops the last
//! handoff sender; the relay then drains and returns; finally the endpoint
//! and its sessions are told to close.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use portvakt_capture::{CaptureSummary, Link, PacketSource};
use portvakt_config::PortvaktConfig;
use portvakt_core::{handoff, BroadcastHub};
use portvakt_detection::{DetectorRegistry, PortScanDetector};
use portvakt_storage::{AlertStore, SqliteAlertStore};
use portvakt_telemetry::MetricsRecorder;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::error::EngineError;
use crate::pipeline::AlertPipeline;
use crate::relay::{run_relay, RelayStats};
use crate::server::SubscriberServer;
use crate::worker::CaptureWorker;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub capture: CaptureSummary,
    pub relay: RelayStats,
    pub handoff_drops: u64,
}

/// Capture link described by the configuration: the savefile if one is
/// set, the live interface otherwise.
pub fn capture_link(config: &PortvaktConfig) -> Link {
    let capture = &config.capture;
    match &capture.savefile {
        Some(path) => Link::Savefile(path.clone()),
        None => Link::Live {
            interface: capture.interface.clone(),
            promiscuous: capture.promiscuous,
            snaplen: i32::try_from(capture.snaplen).unwrap_or(i32::MAX),
            read_timeout_ms: i32::try_from(capture.read_timeout_ms).unwrap_or(i32::MAX),
        },
    }
}

pub fn build_registry(config: &PortvaktConfig) -> DetectorRegistry {
    let detection = &config.detection;
    let mut registry = DetectorRegistry::new();
    registry.register(Box::new(
        PortScanDetector::new(detection.syn_threshold, detection.window_secs)
            .with_allowlist(detection.allowlist.clone()),
    ));
    registry
}

/// Runs until `shutdown` resolves or the packet source ends.
#[instrument(level = "info", name = "monitor", skip_all)]
pub async fn run<S>(config: PortvaktConfig, shutdown: S) -> Result<RunSummary, EngineError>
where
    S: Future<Output = ()>,
{
    config.log_summary();

    let metrics = Arc::new(MetricsRecorder::new()?);
    // Source first: a capture failure leaves no database file behind.
    let source = PacketSource::open(&capture_link(&config), &config.capture.filter)?;
    let store: Arc<dyn AlertStore> = Arc::new(SqliteAlertStore::open(
        &config.storage.path,
        Duration::from_millis(config.storage.busy_timeout_ms),
    )?);

    let hub = Arc::new(BroadcastHub::new(config.server.subscriber_queue));
    let (alert_handoff, handoff_rx) = handoff(config.server.handoff_capacity);
    let server = SubscriberServer::bind(
        config.server.bind,
        &config.server.path,
        Arc::clone(&hub),
        Arc::clone(&metrics),
    )
    .await?;

    let pipeline = AlertPipeline::new(store, alert_handoff.clone(), Arc::clone(&metrics));
    let worker = CaptureWorker::new(
        build_registry(&config),
        pipeline,
        Arc::clone(&metrics),
        Duration::from_secs(config.telemetry.log_throttle_secs),
    );
    let mut capture = worker.spawn(source)?;

    let relay = tokio::spawn(run_relay(handoff_rx, Arc::clone(&hub), Arc::clone(&metrics)));
    let (stop_sessions, sessions) = watch::channel(false);
    let endpoint = tokio::spawn(server.serve(sessions));

    tokio::pin!(shutdown);
    tokio::select! {
        _ = &mut shutdown => info!("shutdown requested"),
        _ = capture.finished() => info!("packet source ended"),
    }

    let capture_summary = match capture.shutdown().await {
        Ok(summary) => summary,
        Err(e) => {
            // Sessions still need closing before the error goes up.
            let _ = stop_sessions.send(true);
            return Err(e);
        }
    };

    // The worker's pipeline held the other sender; this one lets the relay finish.
    let handoff_drops = alert_handoff.dropped();
    drop(alert_handoff);
    let relay_stats = relay.await.unwrap_or_else(|e| {
        warn!(error = %e, "relay task failed");
        RelayStats::default()
    });

    let _ = stop_sessions.send(true);
    if let Err(e) = endpoint.await {
        warn!(error = %e, "subscriber endpoint task failed");
    }

    let summary = RunSummary {
        capture: capture_summary,
        relay: relay_stats,
        handoff_drops,
    };
    info!(
        frames = summary.capture.frames,
        packets = summary.capture.packets,
        malformed = summary.capture.malformed,
        alerts = metrics.alerts_persisted.get(),
        relayed = summary.relay.relayed,
        handoff_drops = summary.handoff_drops,
        "monitor stopped"
    );
    if let Ok(text) = metrics.gather_metrics() {
        debug!(metrics = %text, "final metrics");
    }
    Ok(summary)
}
