//! Schema registry -- the gatekeeper between producers and durable storage.
//!
//! [`SchemaRegistry`] holds one [`SourceSchema`] per source type and checks
//! every event against the schema for its `source_type`. Events missing
//! required fields are quarantined: a [`QuarantineRecord`] is appended to an
//! in-process log and the event is dropped from further processing, never
//! silently discarded.
//!
//! # Unregistered sources
//! An event whose source type has no schema passes through with an
//! `unregistered_source` tag. Unknown-but-legitimate feeds are never
//! dropped; strict deployments register a schema for every expected source.

use std::collections::HashMap;

use serde::Serialize;

use sentrypipe_core::event::{NormalizedEvent, TAG_UNREGISTERED_SOURCE};
use sentrypipe_core::metrics as m;

/// Validation contract for one source type.
///
/// Created at registry initialization, never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct SourceSchema {
    /// Source type the schema applies to.
    pub source_type: String,
    /// Field names that must be set, either as a named attribute or as an
    /// `extra` key.
    pub required_fields: Vec<String>,
    /// Field names the source may set; informational only.
    pub optional_fields: Vec<String>,
    /// Free-text description.
    pub description: String,
}

impl SourceSchema {
    /// Create a schema with required fields only.
    pub fn new(
        source_type: impl Into<String>,
        required_fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            source_type: source_type.into(),
            required_fields: required_fields.into_iter().map(Into::into).collect(),
            optional_fields: Vec::new(),
            description: String::new(),
        }
    }

    /// Build a schema from a `[[schema]]` config block.
    pub fn from_config(config: &sentrypipe_core::config::SchemaConfig) -> Self {
        Self {
            source_type: config.source_type.clone(),
            required_fields: config.required_fields.clone(),
            optional_fields: config.optional_fields.clone(),
            description: config.description.clone(),
        }
    }
}

/// One quarantined event: enough context to diagnose the feed.
///
/// Append-only; external retention policy may prune the exported log, the
/// registry itself never deletes entries.
#[derive(Debug, Clone, Serialize)]
pub struct QuarantineRecord {
    /// ID of the rejected event.
    pub event_id: String,
    /// Source type of the rejected event.
    pub source_type: String,
    /// Required fields that were missing.
    pub missing_fields: Vec<String>,
    /// Original unparsed payload.
    pub raw: String,
}

/// Per-source validation counters since registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    /// Events that passed validation.
    pub valid: u64,
    /// Events that were quarantined.
    pub quarantined: u64,
}

/// Per-source-type schema store with quarantine log and counters.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, SourceSchema>,
    quarantine: Vec<QuarantineRecord>,
    stats: HashMap<String, SourceStats>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-loaded with schemas.
    pub fn with_schemas(schemas: impl IntoIterator<Item = SourceSchema>) -> Self {
        let mut registry = Self::new();
        for schema in schemas {
            registry.register(schema);
        }
        registry
    }

    /// Register a schema, overwriting any previous schema for the same
    /// source type and resetting its counters to zero. Idempotent.
    pub fn register(&mut self, schema: SourceSchema) {
        tracing::debug!(
            source_type = schema.source_type.as_str(),
            required = schema.required_fields.len(),
            "registered source schema"
        );
        self.stats
            .insert(schema.source_type.clone(), SourceStats::default());
        self.schemas.insert(schema.source_type.clone(), schema);
    }

    /// Validate an event against the schema for its source type.
    ///
    /// Returns `true` when the event may proceed to the sink. An event with
    /// an unregistered source type passes through tagged
    /// `unregistered_source`. A registered event missing required fields is
    /// recorded in the quarantine log and `false` is returned.
    pub fn validate(&mut self, event: &mut NormalizedEvent) -> bool {
        let Some(schema) = self.schemas.get(&event.source_type) else {
            event.tag(TAG_UNREGISTERED_SOURCE);
            tracing::debug!(
                event_id = event.event_id.as_str(),
                source_type = event.source_type.as_str(),
                "no schema registered, passing event through tagged"
            );
            return true;
        };

        let missing: Vec<String> = schema
            .required_fields
            .iter()
            .filter(|field| {
                !event.has_field(field.as_str()) && !event.extra.contains_key(field.as_str())
            })
            .cloned()
            .collect();

        let stats = self.stats.entry(event.source_type.clone()).or_default();

        if !missing.is_empty() {
            stats.quarantined += 1;
            tracing::warn!(
                event_id = event.event_id.as_str(),
                source_type = event.source_type.as_str(),
                missing_fields = ?missing,
                "event quarantined: missing required fields"
            );
            metrics::counter!(
                m::INGEST_QUARANTINED_TOTAL,
                m::LABEL_SOURCE_TYPE => event.source_type.clone()
            )
            .increment(1);
            self.quarantine.push(QuarantineRecord {
                event_id: event.event_id.clone(),
                source_type: event.source_type.clone(),
                missing_fields: missing,
                raw: event.raw.clone(),
            });
            return false;
        }

        stats.valid += 1;
        true
    }

    /// Full quarantine history, in insertion order.
    pub fn quarantine_log(&self) -> &[QuarantineRecord] {
        &self.quarantine
    }

    /// Running per-source counters since registration.
    pub fn stats(&self) -> &HashMap<String, SourceStats> {
        &self.stats
    }

    /// Look up the schema for a source type.
    pub fn schema(&self, source_type: &str) -> Option<&SourceSchema> {
        self.schemas.get(source_type)
    }

    /// Number of registered schemas.
    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }
}
