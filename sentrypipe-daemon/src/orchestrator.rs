//! Pipeline orchestration -- assembly, queue wiring, and lifecycle.
//!
//! The [`Orchestrator`] is the central coordinator of `sentrypipe-daemon`.
//! It loads configuration, creates the ingestion queue, builds the pipeline
//! coordinator with the configured schemas, starts the enabled source
//! adapters, and manages startup/shutdown ordering.
//!
//! # Shutdown order
//!
//! 1. Cancel the shared token (adapters stop accepting input)
//! 2. Join adapter tasks with a bounded timeout (releases sockets)
//! 3. Join the coordinator, which drains the queue and performs the
//!    final unconditional sink flush

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use sentrypipe_core::config::SentrypipeConfig;
use sentrypipe_core::metrics as m;
use sentrypipe_ingest::coordinator::CoordinatorReport;
use sentrypipe_ingest::source::SourceAdapter;
use sentrypipe_ingest::{
    CloudTrailAdapter, IngestError, PipelineConfig, PipelineCoordinator, QueueHandle,
    SourceSchema, SyslogUdpAdapter, queue,
};

use crate::metrics_server;

/// How long adapters get to stop before being aborted.
const ADAPTER_STOP_TIMEOUT: Duration = Duration::from_secs(5);
/// How long the coordinator gets to drain and flush before being aborted.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// The daemon orchestrator.
///
/// Owns the pipeline components between build and run, and the task
/// handles while running.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: SentrypipeConfig,
    /// Shutdown token shared (as child tokens) with every task.
    cancel: CancellationToken,
    /// Producer handle, held until adapters are spawned.
    queue_handle: Option<QueueHandle>,
    /// The coordinator, held until `start` spawns it.
    coordinator: Option<PipelineCoordinator>,
    /// Running adapter tasks, by source type.
    adapter_tasks: Vec<(&'static str, JoinHandle<Result<(), IngestError>>)>,
    /// Running coordinator task.
    coordinator_task: Option<JoinHandle<Result<CoordinatorReport, IngestError>>>,
    /// Uptime metric updater task.
    uptime_task: Option<JoinHandle<()>>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration from a file and build the orchestrator.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = SentrypipeConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    pub async fn build_from_config(config: SentrypipeConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        // Install the metrics recorder before anything emits metrics
        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let (queue_handle, queue_rx) = queue::bounded(config.queue.capacity);
        let cancel = CancellationToken::new();

        let schemas: Vec<SourceSchema> =
            config.schemas.iter().map(SourceSchema::from_config).collect();
        let coordinator = PipelineCoordinator::builder()
            .config(PipelineConfig::from_core(&config))
            .receiver(queue_rx)
            .schemas(schemas)
            .cancel_token(cancel.child_token())
            .build()
            .await
            .map_err(|e| anyhow::anyhow!("failed to build pipeline coordinator: {}", e))?;

        tracing::info!(
            schemas = coordinator.schema_count(),
            queue_capacity = config.queue.capacity,
            syslog = config.syslog.enabled,
            cloudtrail = config.cloudtrail.enabled,
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            cancel,
            queue_handle: Some(queue_handle),
            coordinator: Some(coordinator),
            adapter_tasks: Vec::new(),
            coordinator_task: None,
            uptime_task: None,
            start_time: Instant::now(),
        })
    }

    /// Spawn the coordinator and every enabled adapter.
    pub async fn start(&mut self) -> Result<()> {
        let coordinator = self
            .coordinator
            .take()
            .context("orchestrator already started")?;
        let queue_handle = self
            .queue_handle
            .take()
            .context("orchestrator already started")?;

        self.coordinator_task = Some(tokio::spawn(coordinator.run()));

        if self.config.syslog.enabled {
            let adapter =
                SyslogUdpAdapter::new(self.config.syslog.clone(), queue_handle.clone());
            let cancel = self.cancel.child_token();
            self.adapter_tasks
                .push(("syslog", tokio::spawn(adapter.run(cancel))));
            tracing::info!(
                bind_addr = self.config.syslog.bind_addr.as_str(),
                "syslog adapter started"
            );
        }

        if self.config.cloudtrail.enabled {
            let adapter =
                CloudTrailAdapter::new(self.config.cloudtrail.clone(), queue_handle.clone());
            let cancel = self.cancel.child_token();
            self.adapter_tasks
                .push(("aws_cloudtrail", tokio::spawn(adapter.run(cancel))));
            tracing::info!(
                spool_dir = self.config.cloudtrail.spool_dir.as_str(),
                "cloudtrail adapter started"
            );
        }

        // Adapters now hold the only producer handles; dropping ours lets
        // the coordinator observe a closed queue once they all stop.
        drop(queue_handle);

        if self.config.metrics.enabled {
            metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION"))
                .set(1.0);
            self.uptime_task = Some(spawn_uptime_updater(
                self.start_time,
                self.cancel.child_token(),
            ));
        }

        tracing::info!(adapters = self.adapter_tasks.len(), "pipeline running");
        Ok(())
    }

    /// Run until a shutdown signal arrives, then stop everything.
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;

        let signal = wait_for_shutdown_signal().await?;
        tracing::info!(signal, "shutdown signal received");

        self.stop().await?;
        Ok(())
    }

    /// Graceful shutdown: cancel, join adapters, then join the coordinator.
    ///
    /// Returns the coordinator's final report when it stopped in time.
    pub async fn stop(&mut self) -> Result<Option<CoordinatorReport>> {
        tracing::info!("stopping pipeline");
        self.cancel.cancel();

        for (name, mut task) in self.adapter_tasks.drain(..) {
            match tokio::time::timeout(ADAPTER_STOP_TIMEOUT, &mut task).await {
                Ok(Ok(Ok(()))) => tracing::info!(adapter = name, "adapter stopped"),
                Ok(Ok(Err(e))) => {
                    tracing::warn!(adapter = name, error = %e, "adapter stopped with error");
                }
                Ok(Err(e)) => {
                    tracing::error!(adapter = name, error = %e, "adapter task panicked");
                }
                Err(_) => {
                    tracing::warn!(adapter = name, "adapter did not stop in time, aborting");
                    task.abort();
                }
            }
        }

        if let Some(task) = self.uptime_task.take() {
            let _ = task.await;
        }

        let report = match self.coordinator_task.take() {
            Some(mut task) => match tokio::time::timeout(DRAIN_TIMEOUT, &mut task).await {
                Ok(Ok(Ok(report))) => {
                    tracing::info!(
                        processed = report.processed,
                        quarantined = report.quarantined,
                        flushed_events = report.flushed_events,
                        flush_failures = report.flush_failures,
                        "coordinator stopped"
                    );
                    Some(report)
                }
                Ok(Ok(Err(e))) => {
                    tracing::error!(error = %e, "coordinator stopped with error");
                    None
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "coordinator task panicked");
                    None
                }
                Err(_) => {
                    tracing::error!("coordinator did not drain in time, aborting");
                    task.abort();
                    None
                }
            },
            None => None,
        };

        tracing::info!("pipeline stopped");
        Ok(report)
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &SentrypipeConfig {
        &self.config
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Spawn a background task that periodically refreshes the uptime metric.
fn spawn_uptime_updater(start_time: Instant, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                }
                _ = cancel.cancelled() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
