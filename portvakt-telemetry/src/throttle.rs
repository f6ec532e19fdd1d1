//! ## portvakt-telemetry::throttle
//! **Interval-based log rate limiting**
//!
//! Hot paths (per-packet tracing, repeated storage failures) go through a
//! [`LogThrottle`] so a persistent fault produces one line per interval
//! instead of one per packet. The number of swallowed events is handed back
//! on the next permitted call so it can be logged alongside.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct LogThrottle {
    interval: Duration,
    last: Option<Instant>,
    suppressed: u64,
}

impl LogThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
            suppressed: 0,
        }
    }

    /// `Some(n)` if the caller may log now, where `n` is the number of
    /// events suppressed since the previous permitted one.
    pub fn permit(&mut self) -> Option<u64> {
        self.permit_at(Instant::now())
    }

    pub fn permit_at(&mut self, now: Instant) -> Option<u64> {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => {
                self.suppressed += 1;
                None
            }
            _ => {
                self.last = Some(now);
                Some(std::mem::take(&mut self.suppressed))
            }
        }
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}
