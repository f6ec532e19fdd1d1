//! ## portvakt-core::broadcast
//! **Live-subscriber set with best-effort fan-out**
//!
//! Every subscriber owns a bounded FIFO queue; the transport task drains it
//! onto the wire. `broadcast` never awaits: it `try_send`s into each queue,
//! collects the ones that failed, and evicts them once the sweep is done.
//! A failed queue means the session is gone or too slow to keep up, so the
//! subscriber is excluded from every later broadcast.

mod session;

pub use session::{InvalidTransition, SessionEvent, SubscriberState};

use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::alert::AlertRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum HubError {
    #[error("failed to encode wire message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Hub-side handle of a connected session.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: SubscriberId,
    peer: Option<SocketAddr>,
    tx: mpsc::Sender<Arc<str>>,
}

impl Subscriber {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }
}

/// Session-side end of a subscriber's queue.
#[derive(Debug)]
pub struct SubscriberQueue {
    id: SubscriberId,
    rx: mpsc::Receiver<Arc<str>>,
}

impl SubscriberQueue {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// `None` once the hub evicted the subscriber and the queue is drained.
    pub async fn next(&mut self) -> Option<Arc<str>> {
        self.rx.recv().await
    }

    pub fn try_next(&mut self) -> Option<Arc<str>> {
        self.rx.try_recv().ok()
    }
}

/// Outcome of a single fan-out sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub evicted: Vec<SubscriberId>,
}

pub struct BroadcastHub {
    subscribers: Mutex<BTreeMap<SubscriberId, Subscriber>>,
    next_id: AtomicU64,
    queue_depth: usize,
}

impl BroadcastHub {
    pub fn new(queue_depth: usize) -> Self {
        Self {
            subscribers: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            queue_depth: queue_depth.max(1),
        }
    }

    /// Allocates an identity and a queue. The subscriber is not part of the
    /// broadcast set until [`connect`](Self::connect) is called.
    pub fn subscribe(&self, peer: Option<SocketAddr>) -> (Subscriber, SubscriberQueue) {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.queue_depth);
        (Subscriber { id, peer, tx }, SubscriberQueue { id, rx })
    }

    /// Registers a subscriber. Returns `false` if it was already present.
    pub fn connect(&self, subscriber: Subscriber) -> bool {
        let mut subscribers = self.subscribers.lock();
        if subscribers.contains_key(&subscriber.id) {
            return false;
        }
        debug!(subscriber = %subscriber.id, peer = ?subscriber.peer, "subscriber connected");
        subscribers.insert(subscriber.id, subscriber);
        true
    }

    /// Removes a subscriber. Returns `false` if it was already gone.
    pub fn disconnect(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.lock().remove(&id).is_some();
        if removed {
            debug!(subscriber = %id, "subscriber disconnected");
        }
        removed
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Encodes the record once and fans it out. Only an encoding failure is
    /// an error; individual subscriber failures end up in the report.
    pub fn broadcast(&self, record: &AlertRecord) -> Result<BroadcastReport, HubError> {
        let message: Arc<str> = record.to_wire_json()?.into();
        Ok(self.broadcast_text(message))
    }

    pub fn broadcast_text(&self, message: Arc<str>) -> BroadcastReport {
        let mut subscribers = self.subscribers.lock();
        let mut report = BroadcastReport::default();

        for (id, subscriber) in subscribers.iter() {
            match subscriber.tx.try_send(Arc::clone(&message)) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    debug!(subscriber = %id, error = %e, "delivery failed");
                    report.evicted.push(*id);
                }
            }
        }

        for id in &report.evicted {
            subscribers.remove(id);
        }
        report
    }
}

impl fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("subscribers", &self.len())
            .field("queue_depth", &self.queue_depth)
            .finish()
    }
}
