//! # Portvakt Detection
//!
//! Stateful detectors run on the capture thread, one packet at a time.
//!
//! ### Components:
//! - `registry`: ordered detector list with per-detector fault isolation
//! - `window`: per-key sliding-window event counter
//! - `portscan`: SYN-rate port-scan detector built on the window

use portvakt_core::{Alert, Packet};
use thiserror::Error;

pub mod portscan;
pub mod registry;
pub mod window;

pub use portscan::PortScanDetector;
pub use registry::DetectorRegistry;
pub use window::SlidingWindow;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DetectionError {
    #[error("packet timestamp predates the unix epoch")]
    TimestampBeforeEpoch,
    #[error("{0}")]
    Malformed(String),
}

/// A stateful check over the packet stream.
///
/// `process` takes `&mut self`: each detector's state has exactly one writer,
/// the capture thread that owns the registry.
pub trait Detector: Send {
    fn name(&self) -> &'static str;

    fn process(&mut self, packet: &Packet) -> Result<Option<Alert>, DetectionError>;
}
