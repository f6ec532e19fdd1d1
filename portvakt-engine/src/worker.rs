//! ## portvakt-engine::worker
//! **Capture-thread side of the pipeline**
//!
//! [`CaptureWorker`] is the [`PacketSink`] the packet source drives. For each
//! decoded packet it runs the detector registry and submits every alert to
//! the [`AlertPipeline`], all synchronously and in arrival order. Anything
//! that could repeat per packet (tracing, detector faults, persistence
//! failures) is logged through a [`LogThrottle`].

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use portvakt_capture::{CaptureError, CaptureSummary, DecodeError, PacketSink, PacketSource, StopHandle};
use portvakt_core::Packet;
use portvakt_detection::DetectorRegistry;
use portvakt_telemetry::{LogThrottle, MetricsRecorder};
use tokio::sync::oneshot;
use tracing::{info, trace, warn, Level};

use crate::error::EngineError;
use crate::pipeline::AlertPipeline;

pub const CAPTURE_THREAD: &str = "portvakt-capture";

pub struct CaptureWorker {
    registry: DetectorRegistry,
    pipeline: AlertPipeline,
    metrics: Arc<MetricsRecorder>,
    packet_log: LogThrottle,
    alert_log: LogThrottle,
    fault_log: LogThrottle,
    persist_log: LogThrottle,
}

impl CaptureWorker {
    pub fn new(
        registry: DetectorRegistry,
        pipeline: AlertPipeline,
        metrics: Arc<MetricsRecorder>,
        log_interval: Duration,
    ) -> Self {
        Self {
            registry,
            pipeline,
            metrics,
            packet_log: LogThrottle::new(log_interval),
            alert_log: LogThrottle::new(log_interval),
            fault_log: LogThrottle::new(log_interval),
            persist_log: LogThrottle::new(log_interval),
        }
    }

    /// Moves the worker and the source onto a dedicated, named OS thread.
    pub fn spawn(self, source: PacketSource) -> io::Result<CaptureThread> {
        let stop = source.stop_handle();
        let (done_tx, done_rx) = oneshot::channel();
        let handle = thread::Builder::new()
            .name(CAPTURE_THREAD.into())
            .spawn(move || {
                let result = source.start(self);
                let _ = done_tx.send(());
                result
            })?;

        Ok(CaptureThread {
            handle,
            stop,
            done: Some(done_rx),
        })
    }
}

impl PacketSink for CaptureWorker {
    fn on_packet(&mut self, packet: Packet) {
        self.metrics.frames_captured.inc();
        self.metrics.packets_decoded.inc();

        if tracing::enabled!(Level::TRACE) {
            if let Some(suppressed) = self.packet_log.permit() {
                trace!(
                    src = %packet.source,
                    dst = %packet.destination,
                    sport = ?packet.source_port,
                    dport = ?packet.destination_port,
                    transport = ?packet.transport,
                    suppressed,
                    "packet"
                );
            }
        }

        let metrics = &self.metrics;
        let fault_log = &mut self.fault_log;
        let alerts = self.registry.process_with(&packet, |detector, error| {
            metrics.record_detector_fault(detector);
            if let Some(suppressed) = fault_log.permit() {
                warn!(detector, %error, suppressed, "detector fault, packet skipped");
            }
        });

        for alert in alerts {
            self.metrics.alerts_detected.inc();
            match self.pipeline.submit(&alert) {
                Ok(record) => {
                    if let Some(suppressed) = self.alert_log.permit() {
                        info!(
                            id = record.id,
                            kind = %record.kind,
                            src = record.source.as_deref().unwrap_or("-"),
                            suppressed,
                            "alert raised"
                        );
                    }
                }
                Err(e) => {
                    if let Some(suppressed) = self.persist_log.permit() {
                        warn!(error = %e, suppressed, "alert lost, continuing capture");
                    }
                }
            }
        }
    }

    fn on_skipped(&mut self) {
        self.metrics.frames_captured.inc();
    }

    fn on_malformed(&mut self, _error: &DecodeError) {
        self.metrics.frames_captured.inc();
        self.metrics.frames_malformed.inc();
    }
}

/// Handle to the running capture thread.
pub struct CaptureThread {
    handle: JoinHandle<Result<CaptureSummary, CaptureError>>,
    stop: StopHandle,
    done: Option<oneshot::Receiver<()>>,
}

impl CaptureThread {
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Resolves once the capture loop has returned, for whatever reason.
    pub async fn finished(&mut self) {
        if let Some(done) = self.done.as_mut() {
            let _ = done.await;
            self.done = None;
        }
    }

    /// Requests a stop and waits for the thread without blocking the runtime.
    pub async fn shutdown(self) -> Result<CaptureSummary, EngineError> {
        self.stop.stop();
        let joined = tokio::task::spawn_blocking(move || self.handle.join())
            .await
            .map_err(|_| EngineError::CapturePanicked)?;
        match joined {
            Ok(result) => Ok(result?),
            Err(_) => Err(EngineError::CapturePanicked),
        }
    }
}
