//! # portvakt-capture
//!
//! Packet Source: reads frames from a live interface or a pcap savefile,
//! applies the BPF filter and decodes each frame into a [`Packet`].
//!
//! [`Packet`]: portvakt_core::Packet

pub mod decode;
pub mod source;

pub use decode::{decode, DecodeError, LinkKind};
pub use source::{
    CaptureError, CaptureSummary, Link, PacketSink, PacketSource, StopHandle,
};
