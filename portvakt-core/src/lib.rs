//! # portvakt-core
//!
//! Types shared by every stage of the capture → detect → sink pipeline.
//!
//! ### Key Submodules:
//! - `alert`: detector output, persisted records and the subscriber wire format
//! - `events`: bounded handoff from the capture thread into the service domain
//! - `packet`: normalized packet events handed from capture to detection
//! - `broadcast`: live-subscriber set and best-effort fan-out

pub mod alert;
pub mod broadcast;
pub mod events;
pub mod packet;

pub mod prelude {
    pub use crate::alert::*;
    pub use crate::broadcast::*;
    pub use crate::events::*;
    pub use crate::packet::*;
}

pub use alert::{Alert, AlertKind, AlertRecord};
pub use broadcast::BroadcastHub;
pub use events::{handoff, AlertHandoff, HandoffReceiver};
pub use packet::{Packet, TcpFlags, Transport};
