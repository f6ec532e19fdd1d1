//! Subscriber server and handoff sizing.

use std::net::{Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct ServerConfig {
    /// Listen address for live subscribers.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// WebSocket path subscribers connect to.
    #[validate(custom(function = validation::validate_route))]
    #[serde(default = "default_path")]
    pub path: String,

    /// Capture → broadcast queue depth. Overflow is dropped and counted.
    #[validate(range(min = 1, max = 1_048_576))]
    #[serde(default = "default_handoff_capacity")]
    pub handoff_capacity: usize,

    /// Per-subscriber outbound queue depth. A subscriber that falls this far
    /// behind is disconnected.
    #[validate(range(min = 1, max = 65_536))]
    #[serde(default = "default_subscriber_queue")]
    pub subscriber_queue: usize,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 8000))
}

fn default_path() -> String {
    "/ws/alerts".into()
}

fn default_handoff_capacity() -> usize {
    1024
}

fn default_subscriber_queue() -> usize {
    64
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            path: default_path(),
            handoff_capacity: default_handoff_capacity(),
            subscriber_queue: default_subscriber_queue(),
        }
    }
}
