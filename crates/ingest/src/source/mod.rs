//! Source adapters -- producers feeding the ingestion queue.
//!
//! An adapter turns source-specific input into [`NormalizedEvent`]s and
//! pushes them through a [`QueueHandle`]. Each adapter runs in its own
//! tokio task; the queue is the only thing shared with the rest of the
//! pipeline.
//!
//! # Adapters
//! - [`SyslogUdpAdapter`]: streaming, listens for syslog datagrams
//! - [`CloudTrailAdapter`]: polling, reads audit-trail objects from a spool
//!   directory with watermark-based dedup
//!
//! # Failure isolation
//! A malformed record is logged and dropped; the adapter keeps going. An
//! unrecoverable failure (e.g. socket bind) ends only that adapter's task.

pub mod cloudtrail;
pub mod syslog;

pub use cloudtrail::CloudTrailAdapter;
pub use syslog::SyslogUdpAdapter;

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;

use crate::error::IngestError;

/// Contract for a pipeline event producer.
///
/// `run` owns the adapter until the token is cancelled, the input is
/// exhausted, or an unrecoverable failure occurs. The queue handle is
/// captured at construction.
#[allow(async_fn_in_trait)]
pub trait SourceAdapter: Send + 'static {
    /// Source type this adapter produces (e.g. `"syslog"`).
    fn source_type(&self) -> &'static str;

    /// Produce events until cancelled or exhausted.
    async fn run(self, cancel: CancellationToken) -> Result<(), IngestError>;
}

/// Adapter lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterStatus {
    /// Constructed, not yet running.
    Idle,
    /// Producing events.
    Running,
    /// Stopped by an unrecoverable error.
    Error(String),
    /// Stopped normally.
    Stopped,
}

/// Dedup marker for polling adapters.
///
/// Tracks which source object keys have already been ingested so repeated
/// poll cycles never re-emit the same underlying object. Streaming adapters
/// have no watermark; duplicate suppression is out of scope for them.
#[derive(Debug, Default)]
pub struct Watermark {
    seen: HashSet<String>,
}

impl Watermark {
    /// Create an empty watermark.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a key as processed. Returns `false` if it was already marked.
    pub fn mark(&mut self, key: impl Into<String>) -> bool {
        self.seen.insert(key.into())
    }

    /// Whether a key has been processed.
    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    /// Number of processed keys.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether no key has been processed yet.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watermark_marks_each_key_once() {
        let mut watermark = Watermark::new();
        assert!(watermark.mark("AWSLogs/obj-001.json"));
        assert!(!watermark.mark("AWSLogs/obj-001.json"));
        assert!(watermark.mark("AWSLogs/obj-002.json"));
        assert_eq!(watermark.len(), 2);
    }

    #[test]
    fn watermark_contains() {
        let mut watermark = Watermark::new();
        assert!(watermark.is_empty());
        watermark.mark("key");
        assert!(watermark.contains("key"));
        assert!(!watermark.contains("other"));
    }
}
