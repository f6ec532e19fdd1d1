//! # portvakt-engine
//!
//! Wires capture, detection, storage and broadcast into a running monitor.
//!
//! ### Key Submodules:
//! - `pipeline`: persist-then-handoff for every raised alert
//! - `worker`: the capture-thread packet sink and its thread handle
//! - `relay`: handoff consumer feeding the broadcast hub
//! - `server`: WebSocket endpoint for live subscribers
//! - `runtime`: startup/shutdown orchestration

mod error;
pub mod pipeline;
pub mod relay;
pub mod runtime;
pub mod server;
pub mod worker;

pub use error::{EngineError, PipelineError};
pub use pipeline::AlertPipeline;
pub use relay::{run_relay, RelayStats};
pub use runtime::{run, RunSummary};
pub use server::SubscriberServer;
pub use worker::{CaptureThread, CaptureWorker};
