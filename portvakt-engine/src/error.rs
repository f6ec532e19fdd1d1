use portvakt_capture::CaptureError;
use portvakt_storage::StorageError;
use portvakt_telemetry::TelemetryError;
use thiserror::Error;

/// Returned by [`AlertPipeline::submit`](crate::AlertPipeline::submit) when
/// the alert could not be persisted. Broadcast problems never surface here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to persist alert: {0}")]
    Persist(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("capture: {0}")]
    Capture(#[from] CaptureError),

    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("telemetry: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("failed to bind subscriber endpoint {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("capture thread panicked")]
    CapturePanicked,
}
