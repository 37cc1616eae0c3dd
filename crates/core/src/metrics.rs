//! Metric name constants and description registration.
//!
//! Every Prometheus metric name is defined centrally here. Components call
//! `metrics::counter!()` / `metrics::gauge!()` with these constants.
//!
//! # Naming convention
//!
//! - Prefix: `sentrypipe_`
//! - Component: `ingest_`, `sink_`, `monitor_`, `adapter_`, `daemon_`
//! - Suffix: `_total` (counter), `_seconds` (time gauge), none (gauge)

use metrics::{describe_counter, describe_gauge};

// --- label keys ---

/// Source type label key (e.g. "syslog", "aws_cloudtrail").
pub const LABEL_SOURCE_TYPE: &str = "source_type";

// --- ingest metrics ---

/// Events accepted by the coordinator, per source type (counter).
pub const INGEST_EVENTS_TOTAL: &str = "sentrypipe_ingest_events_total";

/// Events quarantined by schema validation, per source type (counter).
pub const INGEST_QUARANTINED_TOTAL: &str = "sentrypipe_ingest_quarantined_total";

/// Events currently waiting in the ingestion queue (gauge).
pub const INGEST_QUEUE_DEPTH: &str = "sentrypipe_ingest_queue_depth";

// --- adapter metrics ---

/// Malformed source records dropped by adapters, per source type (counter).
pub const ADAPTER_RECORDS_DROPPED_TOTAL: &str = "sentrypipe_adapter_records_dropped_total";

// --- sink metrics ---

/// Events durably flushed to NDJSON output (counter).
pub const SINK_FLUSHED_EVENTS_TOTAL: &str = "sentrypipe_sink_flushed_events_total";

/// Failed flush attempts (counter).
pub const SINK_FLUSH_FAILURES_TOTAL: &str = "sentrypipe_sink_flush_failures_total";

// --- monitor metrics ---

/// Sources currently past their gap threshold (gauge).
pub const MONITOR_SILENT_SOURCES: &str = "sentrypipe_monitor_silent_sources";

// --- daemon metrics ---

/// Daemon uptime in seconds (gauge).
pub const DAEMON_UPTIME_SECONDS: &str = "sentrypipe_daemon_uptime_seconds";

/// Build info, always 1, with a version label (gauge).
pub const DAEMON_BUILD_INFO: &str = "sentrypipe_daemon_build_info";

/// Register descriptions for every metric.
///
/// Call once, after the global recorder is installed.
pub fn describe_all() {
    describe_counter!(
        INGEST_EVENTS_TOTAL,
        "Events accepted by the pipeline coordinator, per source type"
    );
    describe_counter!(
        INGEST_QUARANTINED_TOTAL,
        "Events quarantined by schema validation, per source type"
    );
    describe_gauge!(
        INGEST_QUEUE_DEPTH,
        "Events currently waiting in the ingestion queue"
    );
    describe_counter!(
        ADAPTER_RECORDS_DROPPED_TOTAL,
        "Malformed source records dropped by adapters"
    );
    describe_counter!(
        SINK_FLUSHED_EVENTS_TOTAL,
        "Events durably flushed to NDJSON output"
    );
    describe_counter!(SINK_FLUSH_FAILURES_TOTAL, "Failed sink flush attempts");
    describe_gauge!(
        MONITOR_SILENT_SOURCES,
        "Sources currently past their gap threshold"
    );
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Daemon uptime in seconds");
    describe_gauge!(DAEMON_BUILD_INFO, "Build info (always 1, version label)");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_follow_convention() {
        let all = [
            INGEST_EVENTS_TOTAL,
            INGEST_QUARANTINED_TOTAL,
            INGEST_QUEUE_DEPTH,
            ADAPTER_RECORDS_DROPPED_TOTAL,
            SINK_FLUSHED_EVENTS_TOTAL,
            SINK_FLUSH_FAILURES_TOTAL,
            MONITOR_SILENT_SOURCES,
            DAEMON_UPTIME_SECONDS,
            DAEMON_BUILD_INFO,
        ];
        for name in all {
            assert!(name.starts_with("sentrypipe_"), "bad prefix: {name}");
        }
    }

    #[test]
    fn describe_all_does_not_panic_without_recorder() {
        describe_all();
    }
}
