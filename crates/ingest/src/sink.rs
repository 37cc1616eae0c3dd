//! Durable sink -- batched NDJSON persistence of validated events.
//!
//! [`FileSink`] buffers validated events in memory and flushes them as
//! newline-delimited JSON, one event per line, into files named by the
//! flush-time UTC timestamp. Output files are append-only and never
//! rewritten.
//!
//! # Failure semantics
//! A failed flush returns an error and keeps the batch in memory; the next
//! flush trigger (size, interval, or shutdown) retries the whole batch.
//! Nothing is discarded on failure.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::io::AsyncWriteExt;

use sentrypipe_core::event::NormalizedEvent;
use sentrypipe_core::metrics as m;

use crate::error::IngestError;

/// Result of one successful flush.
#[derive(Debug, Clone)]
pub struct FlushStats {
    /// Number of events written.
    pub events: usize,
    /// Output file the batch was appended to.
    pub path: PathBuf,
}

/// Batched NDJSON file sink.
pub struct FileSink {
    output_dir: PathBuf,
    batch_size: usize,
    batch: Vec<NormalizedEvent>,
    flush_count: u64,
    flushed_events: u64,
    consecutive_failures: u32,
}

impl FileSink {
    /// Create a sink writing into `output_dir`, creating the directory if
    /// needed.
    pub async fn new(
        output_dir: impl Into<PathBuf>,
        batch_size: usize,
    ) -> Result<Self, IngestError> {
        let output_dir = output_dir.into();
        tokio::fs::create_dir_all(&output_dir).await?;
        Ok(Self {
            output_dir,
            batch_size,
            batch: Vec::with_capacity(batch_size),
            flush_count: 0,
            flushed_events: 0,
            consecutive_failures: 0,
        })
    }

    /// Append an event to the batch, flushing when the batch reaches the
    /// configured size.
    ///
    /// Returns flush statistics when a flush was triggered.
    pub async fn write(&mut self, event: NormalizedEvent) -> Result<Option<FlushStats>, IngestError> {
        self.batch.push(event);
        if self.batch.len() >= self.batch_size {
            return self.flush().await;
        }
        Ok(None)
    }

    /// Flush the current batch to a timestamped NDJSON file.
    ///
    /// An empty batch is a no-op returning `Ok(None)`. On failure the batch
    /// is retained for retry and the error is returned.
    pub async fn flush(&mut self) -> Result<Option<FlushStats>, IngestError> {
        if self.batch.is_empty() {
            return Ok(None);
        }

        // Serialize before touching the file so a bad event cannot leave a
        // partially written batch behind.
        let mut buf = String::with_capacity(self.batch.len() * 256);
        for event in &self.batch {
            buf.push_str(&serde_json::to_string(event)?);
            buf.push('\n');
        }

        let filename = format!("events_{}.ndjson", Utc::now().format("%Y%m%d_%H%M%S"));
        let path = self.output_dir.join(filename);

        match append_lines(&path, buf.as_bytes()).await {
            Ok(()) => {
                let events = self.batch.len();
                self.batch.clear();
                self.flush_count += 1;
                self.flushed_events += events as u64;
                self.consecutive_failures = 0;
                metrics::counter!(m::SINK_FLUSHED_EVENTS_TOTAL).increment(events as u64);
                tracing::debug!(
                    events,
                    path = %path.display(),
                    "flushed event batch"
                );
                Ok(Some(FlushStats { events, path }))
            }
            Err(e) => {
                self.consecutive_failures += 1;
                metrics::counter!(m::SINK_FLUSH_FAILURES_TOTAL).increment(1);
                tracing::warn!(
                    pending = self.batch.len(),
                    consecutive_failures = self.consecutive_failures,
                    path = %path.display(),
                    error = %e,
                    "flush failed, batch retained for retry"
                );
                Err(IngestError::Sink {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Events currently buffered and not yet durable.
    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    /// Configured batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of successful flush operations.
    pub fn flush_count(&self) -> u64 {
        self.flush_count
    }

    /// Total events durably written.
    pub fn flushed_events(&self) -> u64 {
        self.flushed_events
    }

    /// Consecutive failed flush attempts since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

async fn append_lines(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}
