//! Observability configuration.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Telemetry configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct TelemetryConfig {
    /// Default level when `RUST_LOG` is unset.
    #[validate(custom(function = validation::validate_log_level))]
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines.
    #[serde(default)]
    pub json: bool,

    /// Minimum gap between repeated warnings from hot paths (seconds).
    #[validate(range(max = 3600))]
    #[serde(default = "default_log_throttle")]
    pub log_throttle_secs: u64,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_throttle() -> u64 {
    10
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json: false,
            log_throttle_secs: default_log_throttle(),
        }
    }
}
