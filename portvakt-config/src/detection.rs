//! Detection thresholds.

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Port-scan detector parameters.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct DetectionConfig {
    /// Qualifying SYNs from one source, inside the window, that raise an alert.
    #[validate(range(min = 1, max = 1_000_000))]
    #[serde(default = "default_syn_threshold")]
    pub syn_threshold: u32,

    /// Sliding window length (seconds).
    #[validate(range(min = 1, max = 86_400))]
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Sources never counted (scanners you run yourself, monitoring hosts).
    #[validate(custom(function = validation::validate_cidr_list))]
    #[serde(default)]
    pub allowlist: Vec<IpNetwork>,
}

fn default_syn_threshold() -> u32 {
    8
}

fn default_window_secs() -> u64 {
    10
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            syn_threshold: default_syn_threshold(),
            window_secs: default_window_secs(),
            allowlist: Vec::new(),
        }
    }
}
