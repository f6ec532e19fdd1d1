//! ## portvakt-engine::pipeline
//! **Persist, then hand off**
//!
//! Runs on the capture thread. The storage write is synchronous and its
//! failure is the only error `submit` reports. The handoff to the broadcast
//! domain happens strictly after a successful write, never blocks, and a
//! drop is counted instead of being reported as a failure.

use std::sync::Arc;

use portvakt_core::events::{DropReason, HandoffOutcome};
use portvakt_core::{Alert, AlertHandoff, AlertRecord};
use portvakt_storage::AlertStore;
use portvakt_telemetry::MetricsRecorder;
use tracing::{debug, trace};

use crate::error::PipelineError;

pub struct AlertPipeline {
    store: Arc<dyn AlertStore>,
    handoff: AlertHandoff,
    metrics: Arc<MetricsRecorder>,
}

impl AlertPipeline {
    pub fn new(
        store: Arc<dyn AlertStore>,
        handoff: AlertHandoff,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            store,
            handoff,
            metrics,
        }
    }

    pub fn submit(&self, alert: &Alert) -> Result<AlertRecord, PipelineError> {
        let record = match self.store.insert_alert(alert) {
            Ok(record) => record,
            Err(e) => {
                self.metrics.persist_failures.inc();
                return Err(e.into());
            }
        };
        self.metrics.alerts_persisted.inc();

        match self.handoff.offer(record.clone()) {
            HandoffOutcome::Queued => trace!(id = record.id, "record queued for broadcast"),
            HandoffOutcome::Dropped(reason) => {
                self.metrics.handoff_drops.inc();
                match reason {
                    DropReason::QueueFull => {
                        debug!(id = record.id, "broadcast queue full, record not relayed")
                    }
                    DropReason::NoConsumer => {
                        debug!(id = record.id, "no broadcast consumer, record not relayed")
                    }
                }
            }
        }
        Ok(record)
    }

    /// Records persisted but never handed to the broadcast domain.
    pub fn handoff_drops(&self) -> u64 {
        self.handoff.dropped()
    }
}

impl std::fmt::Debug for AlertPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertPipeline")
            .field("handoff", &self.handoff)
            .finish_non_exhaustive()
    }
}
