//! ## portvakt-telemetry::logging
//! **`tracing-subscriber` setup**
//!
//! `RUST_LOG` wins over the configured level. Thread names are always on so
//! lines from the capture thread are easy to tell apart from the service
//! runtime.

use tracing_subscriber::{fmt, EnvFilter};

use crate::TelemetryError;

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    pub fn init(default_level: &str, json: bool) -> Result<(), TelemetryError> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(default_level)?,
        };

        let builder = fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .with_target(true);

        let installed = if json {
            builder.json().try_init()
        } else {
            builder.try_init()
        };
        installed.map_err(|e| TelemetryError::Subscriber(e.to_string()))
    }
}
