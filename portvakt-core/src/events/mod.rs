//! ## portvakt-core::events
//! **Bounded capture → service handoff with counted drops**
//!
//! The capture thread owns an [`AlertHandoff`]; the service domain owns the
//! single [`HandoffReceiver`]. Sending is `try_send` only, so it works from a
//! plain OS thread with no runtime and never parks the capture loop.
//!
//! A record that cannot be queued (queue full, or the receiver is gone) is
//! dropped and counted. Callers get a [`HandoffOutcome`] back so a drop is
//! never indistinguishable from success.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::alert::AlertRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Consumer alive but behind.
    QueueFull,
    /// Receiver dropped or never started.
    NoConsumer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffOutcome {
    Queued,
    Dropped(DropReason),
}

/// Creates a bounded handoff. `capacity` of zero is bumped to one.
pub fn handoff(capacity: usize) -> (AlertHandoff, HandoffReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        AlertHandoff {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        HandoffReceiver { rx },
    )
}

/// Producer side. Cheap to clone; all clones share one drop counter.
#[derive(Clone, Debug)]
pub struct AlertHandoff {
    tx: mpsc::Sender<AlertRecord>,
    dropped: Arc<AtomicU64>,
}

impl AlertHandoff {
    pub fn offer(&self, record: AlertRecord) -> HandoffOutcome {
        match self.tx.try_send(record) {
            Ok(()) => HandoffOutcome::Queued,
            Err(TrySendError::Full(_)) => self.count_drop(DropReason::QueueFull),
            Err(TrySendError::Closed(_)) => self.count_drop(DropReason::NoConsumer),
        }
    }

    fn count_drop(&self, reason: DropReason) -> HandoffOutcome {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        HandoffOutcome::Dropped(reason)
    }

    /// Total records dropped across all clones.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn has_consumer(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Consumer side, owned by the relay task.
#[derive(Debug)]
pub struct HandoffReceiver {
    rx: mpsc::Receiver<AlertRecord>,
}

impl HandoffReceiver {
    /// Resolves to `None` once every [`AlertHandoff`] clone is gone and the
    /// queue is drained.
    pub async fn recv(&mut self) -> Option<AlertRecord> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<AlertRecord> {
        self.rx.try_recv().ok()
    }
}
