//! ## portvakt-detection::window
//! **Per-key sliding window of event times**
//!
//! Times are offsets from an arbitrary origin (the detectors use the unix
//! epoch). Each key holds a sorted `VecDeque`; an entry is evicted once it is
//! more than `span` older than the key's newest entry. A late event keeps its
//! own time: it is inserted in order, or dropped if it already falls outside
//! the window. Keys that went idle are swept at most once per `span` of
//! observed time.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SlidingWindow<K> {
    span: Duration,
    entries: HashMap<K, VecDeque<Duration>>,
    latest: Duration,
    last_sweep: Option<Duration>,
}

impl<K: Hash + Eq + Clone> SlidingWindow<K> {
    pub fn new(span: Duration) -> Self {
        Self {
            span,
            entries: HashMap::new(),
            latest: Duration::ZERO,
            last_sweep: None,
        }
    }

    pub fn span(&self) -> Duration {
        self.span
    }

    /// Records an event for `key` and returns how many events for that key
    /// fall inside the window ending at the key's newest event.
    ///
    /// Returns `0` without recording when `at` is already more than `span`
    /// older than that newest event.
    pub fn record(&mut self, key: K, at: Duration) -> usize {
        self.latest = self.latest.max(at);
        self.maybe_sweep();

        let span = self.span;
        let times = self.entries.entry(key).or_default();
        let newest = times.back().map_or(at, |&newest| newest.max(at));
        if newest - at > span {
            return 0;
        }

        let slot = times.partition_point(|&t| t <= at);
        times.insert(slot, at);

        while let Some(&oldest) = times.front() {
            if newest - oldest > span {
                times.pop_front();
            } else {
                break;
            }
        }
        times.len()
    }

    /// Events currently held for `key`.
    pub fn len_for(&self, key: &K) -> usize {
        self.entries.get(key).map_or(0, VecDeque::len)
    }

    pub fn oldest(&self, key: &K) -> Option<Duration> {
        self.entries.get(key).and_then(|t| t.front().copied())
    }

    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }

    /// Drops every key whose newest event is older than `span` at `now`.
    /// Returns the number of keys removed.
    pub fn evict_idle(&mut self, now: Duration) -> usize {
        let span = self.span;
        let before = self.entries.len();
        self.entries.retain(|_, times| match times.back() {
            Some(&newest) => now.saturating_sub(newest) <= span,
            None => false,
        });
        self.last_sweep = Some(now);
        before - self.entries.len()
    }

    fn maybe_sweep(&mut self) {
        match self.last_sweep {
            None => self.last_sweep = Some(self.latest),
            Some(last) if self.latest.saturating_sub(last) >= self.span => {
                self.evict_idle(self.latest);
            }
            Some(_) => {}
        }
    }
}
