//! Event model — the canonical unit flowing through the pipeline.
//!
//! Every source adapter converts its wire format into a [`NormalizedEvent`]
//! before handing it to the ingestion queue. Downstream components (monitor,
//! registry, sink) only ever see this shape.
//!
//! # Invariants
//! - `event_id` is unique for the lifetime of the process (UUID v4).
//! - `timestamp` is always present and always UTC.
//! - `raw` is never mutated after creation.
//! - `tags` and `extra` are append-only; the registry may tag an event but
//!   nothing ever removes an entry.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

// --- source type constants ---

/// Syslog listener source type.
pub const SOURCE_SYSLOG: &str = "syslog";
/// Cloud audit-trail poller source type.
pub const SOURCE_CLOUDTRAIL: &str = "aws_cloudtrail";

/// Tag applied by the registry when an event's source type has no schema.
pub const TAG_UNREGISTERED_SOURCE: &str = "unregistered_source";

/// Named attributes a schema's required/optional field lists may reference.
///
/// Schema validation resolves field names against this table first and falls
/// back to `extra` keys; anything outside both is treated as missing.
pub const FIELD_NAMES: &[&str] = &[
    "event_id",
    "timestamp",
    "source_type",
    "source_host",
    "source_ip",
    "dest_ip",
    "user",
    "process",
    "action",
    "outcome",
    "severity",
    "raw",
];

/// Severity of a security event.
///
/// Closed set, lowercase on the wire. `Ord` allows severity comparison
/// (`Unknown < Low < Medium < High < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Severity not determined by the source.
    #[default]
    Unknown,
    /// Low severity.
    Low,
    /// Medium severity.
    Medium,
    /// High severity.
    High,
    /// Critical — immediate attention required.
    Critical,
}

impl Severity {
    /// Parse a severity from a string, case-insensitively.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Outcome of the action an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The action succeeded.
    Success,
    /// The action failed.
    Failure,
    /// The source did not report an outcome.
    Unknown,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A security telemetry record in the common schema.
///
/// Created by a source adapter, enriched (tags only) by the schema registry,
/// consumed read-only by the sink and the health monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Globally unique event ID (UUID v4, generated at creation).
    pub event_id: String,
    /// Event time, normalized to UTC.
    pub timestamp: DateTime<Utc>,
    /// Producer kind (e.g. `"syslog"`, `"aws_cloudtrail"`).
    pub source_type: String,
    /// Host that produced the event, if known.
    #[serde(default)]
    pub source_host: Option<String>,
    /// Source IP address, if known.
    #[serde(default)]
    pub source_ip: Option<String>,
    /// Destination IP address, if known.
    #[serde(default)]
    pub dest_ip: Option<String>,
    /// User or principal associated with the event.
    #[serde(default)]
    pub user: Option<String>,
    /// Process name, if known.
    #[serde(default)]
    pub process: Option<String>,
    /// Action the event describes (e.g. `"login"`, `"ConsoleLogin"`).
    #[serde(default)]
    pub action: Option<String>,
    /// Outcome of the action, if reported.
    #[serde(default)]
    pub outcome: Option<Outcome>,
    /// Event severity.
    #[serde(default)]
    pub severity: Severity,
    /// Original unparsed payload, retained for audit and quarantine.
    pub raw: String,
    /// Free-form tags. Append-only.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Source-specific fields not promoted to the common schema.
    /// Values are JSON (string | number | boolean | nested mapping).
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl NormalizedEvent {
    /// Create a new event with a fresh `event_id` and everything else unset.
    pub fn new(
        source_type: impl Into<String>,
        timestamp: DateTime<Utc>,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            source_type: source_type.into(),
            source_host: None,
            source_ip: None,
            dest_ip: None,
            user: None,
            process: None,
            action: None,
            outcome: None,
            severity: Severity::Unknown,
            raw: raw.into(),
            tags: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Append a tag. Duplicate tags are ignored, so tagging is idempotent.
    pub fn tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    /// Whether the named attribute is set to a non-empty value.
    ///
    /// Resolves names against [`FIELD_NAMES`]; unknown names return `false`
    /// (the caller decides whether to fall back to `extra`). An empty string
    /// counts as unset, matching the permissive sources that emit `""` for
    /// absent fields.
    pub fn has_field(&self, name: &str) -> bool {
        match name {
            "event_id" => !self.event_id.is_empty(),
            "timestamp" => true,
            "source_type" => !self.source_type.is_empty(),
            "source_host" => is_set(&self.source_host),
            "source_ip" => is_set(&self.source_ip),
            "dest_ip" => is_set(&self.dest_ip),
            "user" => is_set(&self.user),
            "process" => is_set(&self.process),
            "action" => is_set(&self.action),
            "outcome" => self.outcome.is_some(),
            "severity" => true,
            "raw" => !self.raw.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for NormalizedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event[{}] source={} severity={} action={}",
            &self.event_id[..8.min(self.event_id.len())],
            self.source_type,
            self.severity,
            self.action.as_deref().unwrap_or("-"),
        )
    }
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.is_empty())
}

/// Parse an ISO-8601 timestamp string into a UTC time.
///
/// A trailing `Z` is UTC offset zero; explicit offsets are converted to UTC;
/// offset-less values are interpreted as already being UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ParseError::MalformedTimestamp {
            input: value.to_owned(),
            reason: "empty input".to_owned(),
        });
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Offset-less ISO-8601, with or without fractional seconds.
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(ParseError::MalformedTimestamp {
        input: value.to_owned(),
        reason: "not an ISO-8601 timestamp".to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_event() -> NormalizedEvent {
        let ts = parse_timestamp("2026-01-15T12:00:00Z").unwrap();
        let mut event = NormalizedEvent::new(SOURCE_SYSLOG, ts, "<34>raw line");
        event.source_host = Some("server-01".to_owned());
        event.process = Some("sshd".to_owned());
        event.action = Some("log_entry".to_owned());
        event.severity = Severity::High;
        event
    }

    #[test]
    fn new_event_generates_uuid() {
        let ts = Utc::now();
        let a = NormalizedEvent::new("syslog", ts, "x");
        let b = NormalizedEvent::new("syslog", ts, "x");
        assert_eq!(a.event_id.len(), 36);
        assert_ne!(a.event_id, b.event_id);
        assert_eq!(a.severity, Severity::Unknown);
        assert!(a.tags.is_empty());
    }

    #[test]
    fn parse_timestamp_z_suffix() {
        let ts = parse_timestamp("2026-01-15T12:00:00Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-01-15T12:00:00+00:00");
    }

    #[test]
    fn parse_timestamp_explicit_offset_converts_to_utc() {
        let ts = parse_timestamp("2026-01-15T14:30:00+02:30").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-01-15T12:00:00+00:00");
    }

    #[test]
    fn parse_timestamp_naive_is_utc() {
        let ts = parse_timestamp("2026-01-15T12:00:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-01-15T12:00:00+00:00");
    }

    #[test]
    fn parse_timestamp_fractional_seconds() {
        let ts = parse_timestamp("2026-01-15T12:00:00.250Z").unwrap();
        assert_eq!(ts.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn parse_timestamp_rejects_garbage() {
        let err = parse_timestamp("not-a-timestamp").unwrap_err();
        assert!(matches!(err, ParseError::MalformedTimestamp { .. }));
        assert!(err.to_string().contains("not-a-timestamp"));
    }

    #[test]
    fn parse_timestamp_rejects_empty() {
        assert!(parse_timestamp("").is_err());
        assert!(parse_timestamp("   ").is_err());
    }

    #[test]
    fn tag_is_idempotent() {
        let mut event = sample_event();
        event.tag(TAG_UNREGISTERED_SOURCE);
        event.tag(TAG_UNREGISTERED_SOURCE);
        assert_eq!(
            event.tags,
            vec![TAG_UNREGISTERED_SOURCE.to_owned()],
            "duplicate tags must not accumulate"
        );
    }

    #[test]
    fn has_field_on_set_and_unset_attributes() {
        let event = sample_event();
        assert!(event.has_field("timestamp"));
        assert!(event.has_field("source_host"));
        assert!(event.has_field("process"));
        assert!(!event.has_field("user"));
        assert!(!event.has_field("source_ip"));
        assert!(!event.has_field("outcome"));
    }

    #[test]
    fn has_field_treats_empty_string_as_unset() {
        let mut event = sample_event();
        event.user = Some(String::new());
        assert!(!event.has_field("user"));
    }

    #[test]
    fn has_field_unknown_name_is_false() {
        let event = sample_event();
        assert!(!event.has_field("no_such_field"));
    }

    #[test]
    fn field_names_table_is_consistent_with_accessor() {
        let mut event = sample_event();
        event.source_ip = Some("192.168.1.1".to_owned());
        event.dest_ip = Some("10.0.0.1".to_owned());
        event.user = Some("root".to_owned());
        event.outcome = Some(Outcome::Failure);
        for name in FIELD_NAMES {
            assert!(event.has_field(name), "field {name} should resolve");
        }
    }

    #[test]
    fn serialize_roundtrip_is_field_equal() {
        let mut event = sample_event();
        event.tag("test");
        event
            .extra
            .insert("region".to_owned(), serde_json::json!("us-east-1"));
        event.outcome = Some(Outcome::Success);

        let json = serde_json::to_string(&event).unwrap();
        let back: NormalizedEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(event.event_id, back.event_id);
        assert_eq!(event.timestamp, back.timestamp);
        assert_eq!(event.source_type, back.source_type);
        assert_eq!(event.source_host, back.source_host);
        assert_eq!(event.outcome, back.outcome);
        assert_eq!(event.severity, back.severity);
        assert_eq!(event.raw, back.raw);
        assert_eq!(event.tags, back.tags);
        assert_eq!(event.extra, back.extra);
    }

    #[test]
    fn severity_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Severity::Critical).unwrap(),
            "\"critical\""
        );
        let parsed: Severity = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(parsed, Severity::Medium);
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Unknown < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn severity_from_str_loose() {
        assert_eq!(Severity::from_str_loose("LOW"), Some(Severity::Low));
        assert_eq!(Severity::from_str_loose("med"), Some(Severity::Medium));
        assert_eq!(Severity::from_str_loose("crit"), Some(Severity::Critical));
        assert_eq!(Severity::from_str_loose("verbose"), None);
    }

    #[test]
    fn outcome_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Outcome::Failure).unwrap(),
            "\"failure\""
        );
    }

    #[test]
    fn event_display_contains_source_and_severity() {
        let event = sample_event();
        let display = event.to_string();
        assert!(display.contains("syslog"));
        assert!(display.contains("high"));
        assert!(display.contains("log_entry"));
    }

    #[test]
    fn events_are_send_sync() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<NormalizedEvent>();
    }

    proptest! {
        #[test]
        fn parse_timestamp_roundtrips_rfc3339(secs in 0i64..4_000_000_000i64) {
            let dt = DateTime::<Utc>::from_timestamp(secs, 0).unwrap();
            let parsed = parse_timestamp(&dt.to_rfc3339()).unwrap();
            prop_assert_eq!(parsed, dt);
        }
    }
}
