//! Error types — per-domain error definitions.

/// Top-level sentrypipe error type.
#[derive(Debug, thiserror::Error)]
pub enum SentrypipeError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing error.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Record or timestamp parsing error.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Durable sink error.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// Configuration parsing failed.
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// Invalid configuration value.
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Pipeline processing error.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Channel send failed (consumer gone).
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// Channel receive failed.
    #[error("channel receive failed: {0}")]
    ChannelRecv(String),

    /// Pipeline initialization failed.
    #[error("pipeline init failed: {0}")]
    InitFailed(String),
}

/// Record-level parsing error.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Timestamp string could not be interpreted.
    #[error("malformed timestamp '{input}': {reason}")]
    MalformedTimestamp { input: String, reason: String },

    /// A single source record could not be parsed.
    #[error("malformed {source_type} record: {reason}")]
    Record { source_type: String, reason: String },
}

/// Durable sink error.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Writing the output file failed.
    #[error("write failed: {path}: {reason}")]
    Write { path: String, reason: String },

    /// An event could not be serialized.
    #[error("serialize failed: {0}")]
    Serialize(String),
}
