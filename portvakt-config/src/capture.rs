//! Packet capture configuration.
//!
//! Defines how the packet source attaches to the network:
//! - Live capture on a named interface
//! - Offline replay of a pcap savefile

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Packet capture configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct CaptureConfig {
    /// Network interface for live capture.
    #[validate(custom(function = validation::validate_interface))]
    #[serde(default = "default_interface")]
    pub interface: String,

    /// BPF filter expression applied by the kernel before frames reach us.
    #[validate(length(max = 1024))]
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Run in promiscuous mode?
    #[serde(default = "default_promiscuous")]
    pub promiscuous: bool,

    /// Snapshot length in bytes. Headers are all we look at.
    #[validate(range(min = 64, max = 262144))]
    #[serde(default = "default_snaplen", deserialize_with = "deserialize_size")]
    pub snaplen: usize,

    /// Blocking read timeout (milliseconds). Bounds how long `stop` can take.
    #[validate(range(min = 1, max = 5000))]
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u32,

    /// Replay this pcap file instead of capturing live.
    #[serde(default)]
    pub savefile: Option<PathBuf>,
}

fn default_interface() -> String {
    "eth0".into()
}

fn default_filter() -> String {
    "tcp".into()
}

fn default_promiscuous() -> bool {
    true
}

fn default_snaplen() -> usize {
    65535
}

fn default_read_timeout() -> u32 {
    1000
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SizeValue {
    Num(usize),
    Str(String),
}

/// Custom deserializer to allow human‑friendly sizes (e.g. "64KiB") or direct numbers.
fn deserialize_size<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    match SizeValue::deserialize(deserializer)? {
        SizeValue::Num(n) => Ok(n),
        SizeValue::Str(s) => {
            let s = s.trim();
            let split = s
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .unwrap_or(s.len());
            let (num_part, unit_part) = s.split_at(split);
            let number: f64 = num_part.parse().map_err(serde::de::Error::custom)?;
            let multiplier = match unit_part.trim().to_lowercase().as_str() {
                "kb" | "kib" => 1024.0,
                "mb" | "mib" => 1024.0 * 1024.0,
                "" | "b" => 1.0,
                _ => return Err(serde::de::Error::custom("Unknown size unit")),
            };
            Ok((number * multiplier) as usize)
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            filter: default_filter(),
            promiscuous: default_promiscuous(),
            snaplen: default_snaplen(),
            read_timeout_ms: default_read_timeout(),
            savefile: None,
        }
    }
}
