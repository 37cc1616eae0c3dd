//! Cloud audit-trail poller adapter.
//!
//! Polling adapter for CloudTrail-style log objects: each poll cycle scans
//! a spool directory for JSON objects (`{"Records": [...]}`), skips objects
//! already recorded in the [`Watermark`](super::Watermark), and emits one
//! [`NormalizedEvent`] per record. The watermark makes repeated polls
//! replay-safe -- the same underlying log object is never ingested twice.
//!
//! Field mapping per record:
//!
//! | record field              | event field            |
//! |---------------------------|------------------------|
//! | `eventTime`               | `timestamp`            |
//! | `sourceIPAddress`         | `source_ip`            |
//! | `userAgent`               | `source_host`          |
//! | `userIdentity.arn`        | `user`                 |
//! | `eventName`               | `action`               |
//! | `errorCode` present       | `outcome = failure`    |
//! | `eventSource`, `awsRegion`, `errorCode` | `extra`  |
//!
//! One unreadable object or malformed record is logged and skipped; the
//! poll loop keeps running.

use std::path::Path;

use tokio_util::sync::CancellationToken;

use sentrypipe_core::error::ParseError;
use sentrypipe_core::event::{NormalizedEvent, Outcome, SOURCE_CLOUDTRAIL, Severity, parse_timestamp};
use sentrypipe_core::metrics as m;

use super::{AdapterStatus, SourceAdapter, Watermark};
use crate::error::IngestError;
use crate::queue::QueueHandle;

/// Audit-trail spool directory poller.
pub struct CloudTrailAdapter {
    config: sentrypipe_core::config::CloudTrailConfig,
    queue: QueueHandle,
    watermark: Watermark,
    status: AdapterStatus,
    processed_objects: u64,
    dropped_count: u64,
}

impl CloudTrailAdapter {
    /// Create a poller from its config section and a queue handle.
    pub fn new(config: sentrypipe_core::config::CloudTrailConfig, queue: QueueHandle) -> Self {
        Self {
            config,
            queue,
            watermark: Watermark::new(),
            status: AdapterStatus::Idle,
            processed_objects: 0,
            dropped_count: 0,
        }
    }

    /// Objects processed so far.
    pub fn processed_objects(&self) -> u64 {
        self.processed_objects
    }

    /// Malformed records or objects dropped so far.
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count
    }

    /// Current lifecycle status.
    pub fn status(&self) -> &AdapterStatus {
        &self.status
    }

    /// Processed object keys.
    pub fn watermark(&self) -> &Watermark {
        &self.watermark
    }

    /// Run one poll cycle over the spool directory.
    ///
    /// Objects are visited in name order so ingestion order is stable
    /// across hosts. Only a closed queue is fatal; everything else is
    /// logged and skipped.
    pub async fn poll_cycle(&mut self) -> Result<(), IngestError> {
        let spool_dir = self.config.spool_dir.clone();
        let mut entries = match tokio::fs::read_dir(&spool_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    spool_dir = spool_dir.as_str(),
                    error = %e,
                    "cannot read spool directory, skipping poll cycle"
                );
                return Ok(());
            }
        };

        let mut keys = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(&self.config.prefix) {
                continue;
            }
            if self.watermark.contains(&name) {
                continue;
            }
            keys.push(name);
        }
        keys.sort();

        for key in keys {
            // Mark before processing: a poisonous object is skipped forever
            // instead of being retried every cycle.
            self.watermark.mark(key.clone());
            let path = Path::new(&spool_dir).join(&key);
            match self.process_object(&path, &key).await {
                Ok(records) => {
                    self.processed_objects += 1;
                    tracing::debug!(object = key.as_str(), records, "ingested trail object");
                }
                Err(IngestError::Channel(reason)) => {
                    return Err(IngestError::Channel(reason));
                }
                Err(e) => {
                    self.dropped_count += 1;
                    metrics::counter!(
                        m::ADAPTER_RECORDS_DROPPED_TOTAL,
                        m::LABEL_SOURCE_TYPE => SOURCE_CLOUDTRAIL
                    )
                    .increment(1);
                    tracing::warn!(
                        object = key.as_str(),
                        error = %e,
                        "skipping unreadable trail object"
                    );
                }
            }
        }
        Ok(())
    }

    /// Parse one trail object and push its records. Returns the number of
    /// events emitted.
    async fn process_object(&mut self, path: &Path, key: &str) -> Result<usize, IngestError> {
        let body = tokio::fs::read_to_string(path).await?;
        let value: serde_json::Value = serde_json::from_str(&body)?;
        let records = value
            .get("Records")
            .and_then(|r| r.as_array())
            .cloned()
            .unwrap_or_default();

        let mut emitted = 0usize;
        for record in &records {
            match record_to_event(record) {
                Ok(event) => {
                    self.queue.push(event).await?;
                    emitted += 1;
                }
                Err(e) => {
                    self.dropped_count += 1;
                    metrics::counter!(
                        m::ADAPTER_RECORDS_DROPPED_TOTAL,
                        m::LABEL_SOURCE_TYPE => SOURCE_CLOUDTRAIL
                    )
                    .increment(1);
                    tracing::warn!(
                        object = key,
                        error = %e,
                        "dropped malformed trail record"
                    );
                }
            }
        }
        Ok(emitted)
    }
}

impl SourceAdapter for CloudTrailAdapter {
    fn source_type(&self) -> &'static str {
        SOURCE_CLOUDTRAIL
    }

    async fn run(mut self, cancel: CancellationToken) -> Result<(), IngestError> {
        tracing::info!(
            spool_dir = self.config.spool_dir.as_str(),
            poll_interval_secs = self.config.poll_interval_secs,
            "cloudtrail poller started"
        );
        self.status = AdapterStatus::Running;

        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(self.config.poll_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.poll_cycle().await {
                        // poll_cycle only propagates a closed queue
                        tracing::info!(error = %e, "queue closed, stopping cloudtrail poller");
                        break;
                    }
                }
                _ = cancel.cancelled() => {
                    tracing::info!("cloudtrail poller received shutdown signal");
                    break;
                }
            }
        }

        self.status = AdapterStatus::Stopped;
        tracing::info!(
            objects = self.processed_objects,
            dropped = self.dropped_count,
            "cloudtrail poller stopped"
        );
        Ok(())
    }
}

/// Map one CloudTrail record onto the common event schema.
fn record_to_event(record: &serde_json::Value) -> Result<NormalizedEvent, ParseError> {
    let event_time = record
        .get("eventTime")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ParseError::Record {
            source_type: SOURCE_CLOUDTRAIL.to_owned(),
            reason: "missing eventTime".to_owned(),
        })?;
    let timestamp = parse_timestamp(event_time)?;

    let raw = record.to_string();
    let mut event = NormalizedEvent::new(SOURCE_CLOUDTRAIL, timestamp, raw);
    event.severity = Severity::Low;

    event.source_ip = record
        .get("sourceIPAddress")
        .and_then(|v| v.as_str())
        .map(str::to_owned);
    event.source_host = record
        .get("userAgent")
        .and_then(|v| v.as_str())
        .map(str::to_owned);
    event.user = record
        .pointer("/userIdentity/arn")
        .and_then(|v| v.as_str())
        .map(str::to_owned);
    event.action = record
        .get("eventName")
        .and_then(|v| v.as_str())
        .map(str::to_owned);

    let error_code = record.get("errorCode").and_then(|v| v.as_str());
    event.outcome = Some(if error_code.is_some() {
        Outcome::Failure
    } else {
        Outcome::Success
    });

    for (record_field, extra_key) in [
        ("eventSource", "event_source"),
        ("awsRegion", "region"),
        ("errorCode", "error_code"),
    ] {
        if let Some(value) = record.get(record_field) {
            if !value.is_null() {
                event.extra.insert(extra_key.to_owned(), value.clone());
            }
        }
    }

    Ok(event)
}
