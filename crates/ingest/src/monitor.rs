//! Health monitor -- per-source liveness tracking and gap detection.
//!
//! [`PipelineMonitor`] remembers when each source type was last seen and how
//! many events it has produced. A source whose silence exceeds the gap
//! threshold is reported by [`check_gaps`](PipelineMonitor::check_gaps) and
//! shows `SILENT` in the summary until its next event.
//!
//! # Per-source state machine
//! ```text
//! UNSEEN -> ACTIVE (first record) -> SILENT (threshold elapses)
//!                 ^                      |
//!                 +----- next record ----+
//! ```
//! No terminal state; a source can cycle indefinitely.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use sentrypipe_core::event::NormalizedEvent;
use sentrypipe_core::metrics as m;

/// Liveness status of one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceStatus {
    /// Seen within the gap threshold.
    #[serde(rename = "ok")]
    Ok,
    /// No event for longer than the gap threshold.
    #[serde(rename = "SILENT")]
    Silent,
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Silent => write!(f, "SILENT"),
        }
    }
}

/// Health summary entry for one source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceHealth {
    /// Total events recorded for this source.
    pub total_events: u64,
    /// Seconds elapsed since the last event.
    pub seconds_since_last: f64,
    /// Current liveness status.
    pub status: SourceStatus,
}

#[derive(Debug, Clone, Copy)]
struct SourceState {
    last_seen: Instant,
    count: u64,
}

/// Per-source liveness tracker.
#[derive(Debug)]
pub struct PipelineMonitor {
    gap_threshold: Duration,
    sources: HashMap<String, SourceState>,
}

impl PipelineMonitor {
    /// Create a monitor with the given silence threshold.
    pub fn new(gap_threshold: Duration) -> Self {
        Self {
            gap_threshold,
            sources: HashMap::new(),
        }
    }

    /// Record an event for its source type.
    pub fn record(&mut self, event: &NormalizedEvent) {
        self.record_at(&event.source_type, Instant::now());
    }

    /// Record an observation at an explicit time. Exposed for tests that
    /// exercise the gap boundary without sleeping.
    pub fn record_at(&mut self, source_type: &str, at: Instant) {
        match self.sources.get_mut(source_type) {
            Some(state) => {
                state.last_seen = at;
                state.count += 1;
            }
            None => {
                tracing::info!(source_type, "first event from source");
                self.sources.insert(
                    source_type.to_owned(),
                    SourceState {
                        last_seen: at,
                        count: 1,
                    },
                );
            }
        }
    }

    /// Return the sources currently past the gap threshold, warning for
    /// each one.
    pub fn check_gaps(&self) -> Vec<String> {
        self.check_gaps_at(Instant::now())
    }

    /// [`check_gaps`](Self::check_gaps) against an explicit time.
    pub fn check_gaps_at(&self, now: Instant) -> Vec<String> {
        let mut silent: Vec<String> = self
            .sources
            .iter()
            .filter(|(_, state)| now.saturating_duration_since(state.last_seen) > self.gap_threshold)
            .map(|(source_type, state)| {
                tracing::warn!(
                    source_type = source_type.as_str(),
                    silent_secs = now.saturating_duration_since(state.last_seen).as_secs(),
                    threshold_secs = self.gap_threshold.as_secs(),
                    "source feed silent past gap threshold"
                );
                source_type.clone()
            })
            .collect();
        silent.sort();
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(m::MONITOR_SILENT_SOURCES).set(silent.len() as f64);
        silent
    }

    /// Per-source health summary for every source seen so far.
    pub fn summary(&self) -> BTreeMap<String, SourceHealth> {
        self.summary_at(Instant::now())
    }

    /// [`summary`](Self::summary) against an explicit time.
    pub fn summary_at(&self, now: Instant) -> BTreeMap<String, SourceHealth> {
        self.sources
            .iter()
            .map(|(source_type, state)| {
                let since_last = now.saturating_duration_since(state.last_seen);
                let status = if since_last > self.gap_threshold {
                    SourceStatus::Silent
                } else {
                    SourceStatus::Ok
                };
                (
                    source_type.clone(),
                    SourceHealth {
                        total_events: state.count,
                        seconds_since_last: since_last.as_secs_f64(),
                        status,
                    },
                )
            })
            .collect()
    }

    /// Configured gap threshold.
    pub fn gap_threshold(&self) -> Duration {
        self.gap_threshold
    }

    /// Number of sources seen at least once.
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAP: Duration = Duration::from_secs(600);

    #[test]
    fn unseen_monitor_reports_nothing() {
        let monitor = PipelineMonitor::new(GAP);
        assert!(monitor.check_gaps().is_empty());
        assert!(monitor.summary().is_empty());
        assert_eq!(monitor.source_count(), 0);
    }

    #[test]
    fn record_counts_events_per_source() {
        let mut monitor = PipelineMonitor::new(GAP);
        let t0 = Instant::now();
        monitor.record_at("syslog", t0);
        monitor.record_at("syslog", t0);
        monitor.record_at("aws_cloudtrail", t0);

        let summary = monitor.summary_at(t0);
        assert_eq!(summary["syslog"].total_events, 2);
        assert_eq!(summary["aws_cloudtrail"].total_events, 1);
        assert_eq!(summary["syslog"].status, SourceStatus::Ok);
    }

    #[test]
    fn status_flips_exactly_at_gap_boundary() {
        let mut monitor = PipelineMonitor::new(GAP);
        let t0 = Instant::now();
        monitor.record_at("syslog", t0);

        let just_before = t0 + GAP - Duration::from_secs(1);
        assert_eq!(
            monitor.summary_at(just_before)["syslog"].status,
            SourceStatus::Ok
        );

        let just_after = t0 + GAP + Duration::from_secs(1);
        assert_eq!(
            monitor.summary_at(just_after)["syslog"].status,
            SourceStatus::Silent
        );
    }

    #[test]
    fn check_gaps_lists_only_silent_sources() {
        let mut monitor = PipelineMonitor::new(GAP);
        let t0 = Instant::now();
        monitor.record_at("syslog", t0);
        monitor.record_at("aws_cloudtrail", t0 + GAP);

        let silent = monitor.check_gaps_at(t0 + GAP + Duration::from_secs(1));
        assert_eq!(silent, vec!["syslog"]);
    }

    #[test]
    fn silent_source_returns_to_active_on_next_record() {
        let mut monitor = PipelineMonitor::new(GAP);
        let t0 = Instant::now();
        monitor.record_at("syslog", t0);

        let later = t0 + GAP + Duration::from_secs(5);
        assert_eq!(monitor.check_gaps_at(later), vec!["syslog"]);

        monitor.record_at("syslog", later);
        assert!(monitor.check_gaps_at(later).is_empty());
        assert_eq!(
            monitor.summary_at(later)["syslog"].status,
            SourceStatus::Ok
        );
        assert_eq!(monitor.summary_at(later)["syslog"].total_events, 2);
    }

    #[test]
    fn seconds_since_last_reflects_elapsed_time() {
        let mut monitor = PipelineMonitor::new(GAP);
        let t0 = Instant::now();
        monitor.record_at("syslog", t0);

        let summary = monitor.summary_at(t0 + Duration::from_secs(42));
        let secs = summary["syslog"].seconds_since_last;
        assert!((secs - 42.0).abs() < 0.001, "got {secs}");
    }

    #[test]
    fn summary_serializes_status_strings() {
        let mut monitor = PipelineMonitor::new(GAP);
        let t0 = Instant::now();
        monitor.record_at("syslog", t0);

        let ok = serde_json::to_string(&monitor.summary_at(t0)["syslog"]).unwrap();
        assert!(ok.contains("\"status\":\"ok\""));

        let silent_summary = monitor.summary_at(t0 + GAP + Duration::from_secs(1));
        let silent = serde_json::to_string(&silent_summary["syslog"]).unwrap();
        assert!(silent.contains("\"status\":\"SILENT\""));
    }
}
