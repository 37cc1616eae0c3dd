//! sentrypipe-ingest -- the ingestion-to-persistence pipeline.
//!
//! Source adapters normalize telemetry into events and push them through a
//! bounded queue; the single coordinator task validates each event against
//! the schema registry, tracks per-source liveness, and persists valid
//! events through the batched NDJSON sink.
//!
//! ```text
//! SyslogUdpAdapter --+
//!                    +--> queue --> PipelineCoordinator --> { Monitor,
//! CloudTrailAdapter -+                                        Registry -> Sink }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod monitor;
pub mod queue;
pub mod registry;
pub mod sink;
pub mod source;

pub use config::PipelineConfig;
pub use coordinator::{CoordinatorBuilder, CoordinatorReport, PipelineCoordinator};
pub use error::IngestError;
pub use monitor::{PipelineMonitor, SourceHealth, SourceStatus};
pub use queue::{QueueHandle, QueueReceiver};
pub use registry::{QuarantineRecord, SchemaRegistry, SourceSchema, SourceStats};
pub use sink::{FileSink, FlushStats};
pub use source::{AdapterStatus, CloudTrailAdapter, SourceAdapter, SyslogUdpAdapter, Watermark};
