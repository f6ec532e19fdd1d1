//! # Portvakt Telemetry
//!
//! Logging setup, log throttling and Prometheus metrics.

pub mod logging;
pub mod metrics;
pub mod throttle;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;
pub use throttle::LogThrottle;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(String),

    #[error("metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),
}
