//! Pipeline coordinator -- the single consumer loop.
//!
//! [`PipelineCoordinator`] pops one event at a time from the ingestion
//! queue, records it with the health monitor, validates it against the
//! schema registry, and writes valid events to the sink. Invalid events are
//! dropped after quarantine (still recoverable via the registry's
//! quarantine log).
//!
//! # Internal architecture
//! ```text
//! Adapters -> queue -> Coordinator -> { Monitor, Registry -> Sink }
//! ```
//!
//! The coordinator also owns the periodic triggers: interval-based sink
//! flushes and the health report. On shutdown it stops blocking pops,
//! drains already-queued events non-blockingly, and performs a final
//! unconditional flush.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use sentrypipe_core::event::NormalizedEvent;
use sentrypipe_core::health::HealthStatus;
use sentrypipe_core::metrics as m;

use crate::config::PipelineConfig;
use crate::error::IngestError;
use crate::monitor::PipelineMonitor;
use crate::queue::QueueReceiver;
use crate::registry::{SchemaRegistry, SourceSchema};
use crate::sink::FileSink;

/// Sink failure streak at which the coordinator reports `Unhealthy`.
const UNHEALTHY_FLUSH_FAILURES: u32 = 3;

/// Counters returned when the coordinator loop ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinatorReport {
    /// Events that passed validation.
    pub processed: u64,
    /// Events quarantined by the registry.
    pub quarantined: u64,
    /// Events durably flushed.
    pub flushed_events: u64,
    /// Successful flush operations.
    pub flushes: u64,
    /// Flush attempts that failed.
    pub flush_failures: u64,
}

/// The consumer loop wiring queue, monitor, registry, and sink.
pub struct PipelineCoordinator {
    config: PipelineConfig,
    receiver: QueueReceiver,
    registry: SchemaRegistry,
    monitor: PipelineMonitor,
    sink: FileSink,
    cancel: CancellationToken,
    processed: u64,
    quarantined: u64,
    flush_failures: u64,
}

impl PipelineCoordinator {
    /// Start building a coordinator.
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    /// Health derived from the sink failure streak.
    pub fn health_status(&self) -> HealthStatus {
        match self.sink.consecutive_failures() {
            0 => HealthStatus::Healthy,
            n if n < UNHEALTHY_FLUSH_FAILURES => {
                HealthStatus::Degraded(format!("{n} consecutive flush failures"))
            }
            n => HealthStatus::Unhealthy(format!("{n} consecutive flush failures")),
        }
    }

    /// Registered schema count (for startup logging and tests).
    pub fn schema_count(&self) -> usize {
        self.registry.schema_count()
    }

    /// Clone of the coordinator's cancellation token.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until cancelled or until every producer handle is dropped.
    ///
    /// Always ends with a final unconditional sink flush.
    pub async fn run(mut self) -> Result<CoordinatorReport, IngestError> {
        tracing::info!(
            schemas = self.registry.schema_count(),
            queue_capacity = self.receiver.capacity(),
            batch_size = self.sink.batch_size(),
            "pipeline coordinator started"
        );

        let mut flush_interval =
            tokio::time::interval(Duration::from_secs(self.config.flush_interval_secs));
        flush_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut report_interval =
            tokio::time::interval(Duration::from_secs(self.config.report_interval_secs));
        report_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick of a fresh interval fires immediately; swallow it
        // so neither trigger runs before any event has arrived.
        flush_interval.tick().await;
        report_interval.tick().await;

        loop {
            tokio::select! {
                maybe_event = self.receiver.pop() => {
                    match maybe_event {
                        Some(event) => self.process_event(event).await,
                        None => {
                            tracing::info!("all producers gone, stopping coordinator");
                            break;
                        }
                    }
                }
                _ = flush_interval.tick() => {
                    self.flush_sink("interval").await;
                }
                _ = report_interval.tick() => {
                    self.report_health();
                }
                _ = self.cancel.cancelled() => {
                    tracing::info!("shutdown signal received, stopping coordinator");
                    break;
                }
            }
        }

        // Already-queued events are drained without waiting for producers.
        let mut drained = 0u64;
        while let Some(event) = self.receiver.try_pop() {
            self.process_event(event).await;
            drained += 1;
        }
        if drained > 0 {
            tracing::info!(drained, "processed events remaining in queue");
        }

        self.final_flush().await;

        let report = CoordinatorReport {
            processed: self.processed,
            quarantined: self.quarantined,
            flushed_events: self.sink.flushed_events(),
            flushes: self.sink.flush_count(),
            flush_failures: self.flush_failures,
        };
        tracing::info!(
            processed = report.processed,
            quarantined = report.quarantined,
            flushed_events = report.flushed_events,
            flush_failures = report.flush_failures,
            "pipeline coordinator stopped"
        );
        Ok(report)
    }

    /// Monitor -> validate -> sink for one event.
    async fn process_event(&mut self, mut event: NormalizedEvent) {
        self.monitor.record(&event);

        if !self.registry.validate(&mut event) {
            // The registry logged the quarantine with the missing fields.
            self.quarantined += 1;
            return;
        }

        metrics::counter!(
            m::INGEST_EVENTS_TOTAL,
            m::LABEL_SOURCE_TYPE => event.source_type.clone()
        )
        .increment(1);
        self.processed += 1;

        if let Err(e) = self.sink.write(event).await {
            // The batch (including this event) is retained by the sink; the
            // next flush trigger retries it.
            self.flush_failures += 1;
            tracing::warn!(error = %e, "size-triggered flush failed");
        }
    }

    /// Flush the sink, keeping the batch on failure.
    async fn flush_sink(&mut self, trigger: &str) {
        match self.sink.flush().await {
            Ok(Some(stats)) => {
                tracing::debug!(trigger, events = stats.events, "sink flushed");
            }
            Ok(None) => {}
            Err(e) => {
                self.flush_failures += 1;
                tracing::warn!(trigger, error = %e, "flush failed, will retry");
            }
        }
    }

    /// Final unconditional flush at shutdown.
    async fn final_flush(&mut self) {
        match self.sink.flush().await {
            Ok(Some(stats)) => {
                tracing::info!(events = stats.events, "final flush completed");
            }
            Ok(None) => {}
            Err(e) => {
                self.flush_failures += 1;
                tracing::error!(
                    pending = self.sink.pending(),
                    error = %e,
                    "final flush failed, events remain unpersisted"
                );
            }
        }
    }

    /// Periodic health report: gap check, per-source summary, counters.
    fn report_health(&self) {
        let silent = self.monitor.check_gaps();
        let summary = self.monitor.summary();
        let health = self.health_status();

        tracing::info!(
            sources = summary.len(),
            silent = silent.len(),
            processed = self.processed,
            quarantined = self.quarantined,
            quarantine_log = self.registry.quarantine_log().len(),
            sink_pending = self.sink.pending(),
            health = %health,
            "pipeline health report"
        );
        for (source_type, entry) in &summary {
            tracing::info!(
                source_type = source_type.as_str(),
                total_events = entry.total_events,
                seconds_since_last = entry.seconds_since_last,
                status = %entry.status,
                "source health"
            );
        }
    }
}

/// Builder assembling a [`PipelineCoordinator`].
pub struct CoordinatorBuilder {
    config: PipelineConfig,
    receiver: Option<QueueReceiver>,
    schemas: Vec<SourceSchema>,
    cancel: Option<CancellationToken>,
}

impl CoordinatorBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            receiver: None,
            schemas: Vec::new(),
            cancel: None,
        }
    }

    /// Set the pipeline settings.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach the consumer side of the ingestion queue. Required.
    pub fn receiver(mut self, receiver: QueueReceiver) -> Self {
        self.receiver = Some(receiver);
        self
    }

    /// Register source schemas at build time.
    pub fn schemas(mut self, schemas: impl IntoIterator<Item = SourceSchema>) -> Self {
        self.schemas.extend(schemas);
        self
    }

    /// Use an externally owned cancellation token.
    ///
    /// Without one, the builder creates a token the caller can clone from
    /// the coordinator before running.
    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Validate settings and assemble the coordinator.
    pub async fn build(self) -> Result<PipelineCoordinator, IngestError> {
        self.config.validate()?;

        let receiver = self.receiver.ok_or_else(|| IngestError::Config {
            field: "receiver".to_owned(),
            reason: "a queue receiver is required".to_owned(),
        })?;

        let sink = FileSink::new(&self.config.output_dir, self.config.batch_size).await?;
        let monitor = PipelineMonitor::new(Duration::from_secs(self.config.gap_threshold_secs));
        let registry = SchemaRegistry::with_schemas(self.schemas);

        Ok(PipelineCoordinator {
            receiver,
            registry,
            monitor,
            sink,
            cancel: self.cancel.unwrap_or_default(),
            config: self.config,
            processed: 0,
            quarantined: 0,
            flush_failures: 0,
        })
    }
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
