//! Alert storage configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct StorageConfig {
    /// SQLite database file. Created on first start.
    #[serde(default = "default_path")]
    pub path: PathBuf,

    /// How long a write waits on a locked database (milliseconds).
    #[validate(range(max = 60_000))]
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_path() -> PathBuf {
    PathBuf::from("alerts.db")
}

fn default_busy_timeout() -> u64 {
    1000
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}
