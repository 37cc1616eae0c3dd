//! Pipeline settings derived from the core configuration.
//!
//! [`PipelineConfig`] collects the values the coordinator and sink need,
//! derived from [`SentrypipeConfig`](sentrypipe_core::config::SentrypipeConfig)
//! via [`PipelineConfig::from_core`].

use serde::{Deserialize, Serialize};

use crate::error::IngestError;

/// Settings for the ingestion pipeline (queue, sink, monitor, reporting).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Ingestion queue capacity.
    pub queue_capacity: usize,
    /// Sink output directory.
    pub output_dir: String,
    /// Sink batch size triggering a flush.
    pub batch_size: usize,
    /// Time-based sink flush interval (seconds).
    pub flush_interval_secs: u64,
    /// Per-source silence threshold (seconds).
    pub gap_threshold_secs: u64,
    /// Interval between health report log lines (seconds).
    pub report_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10_000,
            output_dir: "/var/lib/sentrypipe/events".to_owned(),
            batch_size: 100,
            flush_interval_secs: 5,
            gap_threshold_secs: 600,
            report_interval_secs: 60,
        }
    }
}

impl PipelineConfig {
    /// Derive pipeline settings from the core configuration.
    pub fn from_core(core: &sentrypipe_core::config::SentrypipeConfig) -> Self {
        Self {
            queue_capacity: core.queue.capacity,
            output_dir: core.sink.output_dir.clone(),
            batch_size: core.sink.batch_size,
            flush_interval_secs: core.sink.flush_interval_secs,
            gap_threshold_secs: core.health.gap_threshold_secs,
            report_interval_secs: core.health.report_interval_secs,
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), IngestError> {
        const MAX_BATCH_SIZE: usize = 100_000;
        const MAX_QUEUE_CAPACITY: usize = 10_000_000;
        const MAX_INTERVAL_SECS: u64 = 3600; // 1 hour

        if self.queue_capacity == 0 || self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(IngestError::Config {
                field: "queue_capacity".to_owned(),
                reason: format!("must be 1-{MAX_QUEUE_CAPACITY}"),
            });
        }

        if self.output_dir.is_empty() {
            return Err(IngestError::Config {
                field: "output_dir".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(IngestError::Config {
                field: "batch_size".to_owned(),
                reason: format!("must be 1-{MAX_BATCH_SIZE}"),
            });
        }

        if self.flush_interval_secs == 0 || self.flush_interval_secs > MAX_INTERVAL_SECS {
            return Err(IngestError::Config {
                field: "flush_interval_secs".to_owned(),
                reason: format!("must be 1-{MAX_INTERVAL_SECS}"),
            });
        }

        if self.gap_threshold_secs == 0 {
            return Err(IngestError::Config {
                field: "gap_threshold_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.report_interval_secs == 0 || self.report_interval_secs > MAX_INTERVAL_SECS {
            return Err(IngestError::Config {
                field: "report_interval_secs".to_owned(),
                reason: format!("must be 1-{MAX_INTERVAL_SECS}"),
            });
        }

        Ok(())
    }
}
