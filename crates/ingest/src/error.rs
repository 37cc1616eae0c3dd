//! Ingestion pipeline error types.
//!
//! [`IngestError`] covers every failure inside the pipeline crate.
//! `From<IngestError> for SentrypipeError` lets the daemon propagate with
//! `?` across the crate boundary.

use sentrypipe_core::error::{PipelineError, SentrypipeError, SinkError};

/// Ingestion pipeline domain error.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Queue channel closed (the peer is gone).
    #[error("channel error: {0}")]
    Channel(String),

    /// Writing to the durable sink failed. The batch is retained by the
    /// sink for retry on the next flush trigger.
    #[error("sink error: {path}: {reason}")]
    Sink {
        /// Output file path.
        path: String,
        /// Failure reason.
        reason: String,
    },

    /// A source adapter failed unrecoverably (e.g. socket bind).
    #[error("adapter error: {source_type}: {reason}")]
    Adapter {
        /// Source type of the failing adapter.
        source_type: String,
        /// Failure reason.
        reason: String,
    },

    /// Invalid pipeline configuration value.
    #[error("config error: {field}: {reason}")]
    Config {
        /// Configuration field name.
        field: String,
        /// Failure reason.
        reason: String,
    },

    /// Event serialization failed.
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<IngestError> for SentrypipeError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Channel(msg) => PipelineError::ChannelSend(msg).into(),
            IngestError::Sink { path, reason } => SinkError::Write { path, reason }.into(),
            IngestError::Serialize(e) => SinkError::Serialize(e.to_string()).into(),
            IngestError::Io(e) => SentrypipeError::Io(e),
            other => PipelineError::InitFailed(other.to_string()).into(),
        }
    }
}
