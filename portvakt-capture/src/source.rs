//! ## portvakt-capture::source
//! **Blocking capture loop over libpcap**
//!
//! `open` does every fallible setup step up front so that a missing
//! interface, a privilege problem or a bad filter aborts startup. `start`
//! then owns the calling thread until [`StopHandle::stop`] is observed, the
//! savefile runs out, or the link fails.
//!
//! The loop re-checks the stop flag whenever the read timeout expires, so a
//! stop request takes effect within one timeout period.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use pcap::{Activated, Capture, Device};
use portvakt_core::Packet;
use thiserror::Error;
use tracing::{debug, error, info, trace};

use crate::decode::{decode, DecodeError, LinkKind};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to enumerate capture devices: {0}")]
    DeviceList(#[source] pcap::Error),
    #[error("interface `{0}` not found")]
    InterfaceNotFound(String),
    #[error("insufficient privileges to capture on `{interface}`: {detail}")]
    PermissionDenied { interface: String, detail: String },
    #[error("failed to open `{interface}`: {source}")]
    Open {
        interface: String,
        #[source]
        source: pcap::Error,
    },
    #[error("failed to open savefile {path}: {source}")]
    Savefile {
        path: PathBuf,
        #[source]
        source: pcap::Error,
    },
    #[error("invalid capture filter `{expression}`: {source}")]
    Filter {
        expression: String,
        #[source]
        source: pcap::Error,
    },
    #[error("unsupported data link type {0}")]
    UnsupportedLink(i32),
    #[error("capture receive failed: {0}")]
    Receive(#[source] pcap::Error),
}

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    Live {
        interface: String,
        promiscuous: bool,
        snaplen: i32,
        read_timeout_ms: i32,
    },
    /// Offline replay of a pcap savefile.
    Savefile(PathBuf),
}

/// Receives the outcome of every frame the loop reads.
pub trait PacketSink {
    fn on_packet(&mut self, packet: Packet);

    fn on_skipped(&mut self) {}

    fn on_malformed(&mut self, _error: &DecodeError) {}
}

impl<F: FnMut(Packet)> PacketSink for F {
    fn on_packet(&mut self, packet: Packet) {
        self(packet)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureSummary {
    pub frames: u64,
    pub packets: u64,
    /// Frames without an IP layer.
    pub skipped: u64,
    pub malformed: u64,
}

/// Cloneable, idempotent stop request for a running [`PacketSource`].
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct PacketSource {
    capture: Capture<dyn Activated>,
    link: LinkKind,
    label: String,
    stop: StopHandle,
}

impl PacketSource {
    pub fn open(link: &Link, filter: &str) -> Result<Self, CaptureError> {
        let (mut capture, label): (Capture<dyn Activated>, String) = match link {
            Link::Live {
                interface,
                promiscuous,
                snaplen,
                read_timeout_ms,
            } => {
                let device = Device::list()
                    .map_err(CaptureError::DeviceList)?
                    .into_iter()
                    .find(|d| d.name == *interface)
                    .ok_or_else(|| CaptureError::InterfaceNotFound(interface.clone()))?;

                let capture = Capture::from_device(device)
                    .and_then(|inactive| {
                        inactive
                            .promisc(*promiscuous)
                            .snaplen(*snaplen)
                            .timeout(*read_timeout_ms)
                            .open()
                    })
                    .map_err(|e| open_error(interface, e))?;
                (capture.into(), interface.clone())
            }
            Link::Savefile(path) => {
                let capture = Capture::from_file(path).map_err(|source| CaptureError::Savefile {
                    path: path.clone(),
                    source,
                })?;
                (capture.into(), path.display().to_string())
            }
        };

        if !filter.trim().is_empty() {
            capture
                .filter(filter, true)
                .map_err(|source| CaptureError::Filter {
                    expression: filter.to_string(),
                    source,
                })?;
        }

        let dlt = capture.get_datalink().0;
        let link = LinkKind::from_dlt(dlt).ok_or(CaptureError::UnsupportedLink(dlt))?;
        debug!(source = %label, ?link, filter, "capture opened");

        Ok(Self {
            capture,
            link,
            label,
            stop: StopHandle::default(),
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Runs the capture loop on the calling thread.
    pub fn start<S: PacketSink>(mut self, mut sink: S) -> Result<CaptureSummary, CaptureError> {
        info!(source = %self.label, "capture started");
        let mut summary = CaptureSummary::default();

        while !self.stop.is_stopped() {
            match self.capture.next_packet() {
                Ok(frame) => {
                    summary.frames += 1;
                    let ts = frame.header.ts;
                    let timestamp = frame_time(ts.tv_sec as i64, ts.tv_usec as i64);
                    match decode(self.link, frame.data, timestamp) {
                        Ok(Some(packet)) => {
                            summary.packets += 1;
                            sink.on_packet(packet);
                        }
                        Ok(None) => {
                            summary.skipped += 1;
                            sink.on_skipped();
                        }
                        Err(e) => {
                            summary.malformed += 1;
                            trace!(error = %e, "undecodable frame");
                            sink.on_malformed(&e);
                        }
                    }
                }
                Err(pcap::Error::TimeoutExpired) => continue,
                Err(pcap::Error::NoMorePackets) => {
                    debug!(source = %self.label, "savefile exhausted");
                    break;
                }
                Err(e) => {
                    error!(source = %self.label, error = %e, "capture failed");
                    return Err(CaptureError::Receive(e));
                }
            }
        }

        info!(
            source = %self.label,
            frames = summary.frames,
            packets = summary.packets,
            malformed = summary.malformed,
            "capture stopped"
        );
        Ok(summary)
    }
}

fn open_error(interface: &str, source: pcap::Error) -> CaptureError {
    let detail = source.to_string();
    let lowered = detail.to_ascii_lowercase();
    if lowered.contains("permission") || lowered.contains("not permitted") {
        CaptureError::PermissionDenied {
            interface: interface.to_string(),
            detail,
        }
    } else {
        CaptureError::Open {
            interface: interface.to_string(),
            source,
        }
    }
}

/// Converts a pcap record header time. Pre-epoch records stay pre-epoch so
/// that detectors can reject them.
fn frame_time(secs: i64, micros: i64) -> SystemTime {
    let offset = Duration::from_secs(secs.unsigned_abs()) + Duration::from_micros(micros.unsigned_abs());
    if secs < 0 {
        UNIX_EPOCH.checked_sub(offset).unwrap_or(UNIX_EPOCH)
    } else {
        UNIX_EPOCH + offset
    }
}
