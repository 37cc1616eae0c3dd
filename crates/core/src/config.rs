//! Configuration — sentrypipe.toml parsing and runtime settings.
//!
//! [`SentrypipeConfig`] is the top-level structure holding every section of
//! the configuration file.
//!
//! # Load precedence
//! 1. CLI arguments (highest)
//! 2. Environment variables (`SENTRYPIPE_SINK_BATCH_SIZE=200` style)
//! 3. Configuration file (`sentrypipe.toml`)
//! 4. Defaults (`Default` impls)
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), sentrypipe_core::error::SentrypipeError> {
//! use sentrypipe_core::config::SentrypipeConfig;
//!
//! // Load from file + apply environment overrides
//! let config = SentrypipeConfig::load("sentrypipe.toml").await?;
//!
//! // Parse directly from a TOML string
//! let config = SentrypipeConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, SentrypipeError};

/// Top-level sentrypipe configuration.
///
/// Mirrors the structure of `sentrypipe.toml`. Each component reads only its
/// own section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentrypipeConfig {
    /// General settings (logging, data directory).
    pub general: GeneralConfig,
    /// Ingestion queue settings.
    pub queue: QueueConfig,
    /// Durable sink settings.
    pub sink: SinkConfig,
    /// Health monitor settings.
    pub health: HealthConfig,
    /// Syslog listener adapter settings.
    pub syslog: SyslogConfig,
    /// Cloud audit-trail poller adapter settings.
    pub cloudtrail: CloudTrailConfig,
    /// Prometheus metrics endpoint settings.
    pub metrics: MetricsConfig,
    /// Per-source validation schemas (`[[schema]]` blocks).
    #[serde(rename = "schema")]
    pub schemas: Vec<SchemaConfig>,
}

impl SentrypipeConfig {
    /// Load configuration from a TOML file and apply environment overrides.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SentrypipeError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file (no environment overrides).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, SentrypipeError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SentrypipeError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                SentrypipeError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, SentrypipeError> {
        toml::from_str(toml_str).map_err(|e| {
            SentrypipeError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// Override configuration values from environment variables.
    ///
    /// Naming rule: `SENTRYPIPE_{SECTION}_{FIELD}`,
    /// e.g. `SENTRYPIPE_QUEUE_CAPACITY=50000`.
    /// Schema blocks are file/CLI-only and have no environment form.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "SENTRYPIPE_GENERAL_LOG_LEVEL");
        override_string(
            &mut self.general.log_format,
            "SENTRYPIPE_GENERAL_LOG_FORMAT",
        );
        override_string(&mut self.general.data_dir, "SENTRYPIPE_GENERAL_DATA_DIR");

        // Queue
        override_usize(&mut self.queue.capacity, "SENTRYPIPE_QUEUE_CAPACITY");

        // Sink
        override_string(&mut self.sink.output_dir, "SENTRYPIPE_SINK_OUTPUT_DIR");
        override_usize(&mut self.sink.batch_size, "SENTRYPIPE_SINK_BATCH_SIZE");
        override_u64(
            &mut self.sink.flush_interval_secs,
            "SENTRYPIPE_SINK_FLUSH_INTERVAL_SECS",
        );

        // Health
        override_u64(
            &mut self.health.gap_threshold_secs,
            "SENTRYPIPE_HEALTH_GAP_THRESHOLD_SECS",
        );
        override_u64(
            &mut self.health.report_interval_secs,
            "SENTRYPIPE_HEALTH_REPORT_INTERVAL_SECS",
        );

        // Syslog adapter
        override_bool(&mut self.syslog.enabled, "SENTRYPIPE_SYSLOG_ENABLED");
        override_string(&mut self.syslog.bind_addr, "SENTRYPIPE_SYSLOG_BIND_ADDR");
        override_usize(
            &mut self.syslog.max_datagram_size,
            "SENTRYPIPE_SYSLOG_MAX_DATAGRAM_SIZE",
        );

        // CloudTrail adapter
        override_bool(
            &mut self.cloudtrail.enabled,
            "SENTRYPIPE_CLOUDTRAIL_ENABLED",
        );
        override_string(
            &mut self.cloudtrail.spool_dir,
            "SENTRYPIPE_CLOUDTRAIL_SPOOL_DIR",
        );
        override_string(&mut self.cloudtrail.prefix, "SENTRYPIPE_CLOUDTRAIL_PREFIX");
        override_u64(
            &mut self.cloudtrail.poll_interval_secs,
            "SENTRYPIPE_CLOUDTRAIL_POLL_INTERVAL_SECS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "SENTRYPIPE_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "SENTRYPIPE_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "SENTRYPIPE_METRICS_PORT");
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), SentrypipeError> {
        const MAX_QUEUE_CAPACITY: usize = 10_000_000;
        const MAX_BATCH_SIZE: usize = 100_000;
        const MAX_INTERVAL_SECS: u64 = 3600; // 1 hour

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.queue.capacity == 0 || self.queue.capacity > MAX_QUEUE_CAPACITY {
            return Err(ConfigError::InvalidValue {
                field: "queue.capacity".to_owned(),
                reason: format!("must be 1-{MAX_QUEUE_CAPACITY}"),
            }
            .into());
        }

        if self.sink.output_dir.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "sink.output_dir".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        if self.sink.batch_size == 0 || self.sink.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "sink.batch_size".to_owned(),
                reason: format!("must be 1-{MAX_BATCH_SIZE}"),
            }
            .into());
        }

        if self.sink.flush_interval_secs == 0 || self.sink.flush_interval_secs > MAX_INTERVAL_SECS {
            return Err(ConfigError::InvalidValue {
                field: "sink.flush_interval_secs".to_owned(),
                reason: format!("must be 1-{MAX_INTERVAL_SECS}"),
            }
            .into());
        }

        if self.health.gap_threshold_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "health.gap_threshold_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.health.report_interval_secs == 0
            || self.health.report_interval_secs > MAX_INTERVAL_SECS
        {
            return Err(ConfigError::InvalidValue {
                field: "health.report_interval_secs".to_owned(),
                reason: format!("must be 1-{MAX_INTERVAL_SECS}"),
            }
            .into());
        }

        if self.syslog.enabled {
            if self.syslog.bind_addr.parse::<std::net::SocketAddr>().is_err() {
                return Err(ConfigError::InvalidValue {
                    field: "syslog.bind_addr".to_owned(),
                    reason: format!(
                        "'{}' is not a valid socket address",
                        self.syslog.bind_addr
                    ),
                }
                .into());
            }

            if self.syslog.max_datagram_size == 0 || self.syslog.max_datagram_size > 65_535 {
                return Err(ConfigError::InvalidValue {
                    field: "syslog.max_datagram_size".to_owned(),
                    reason: "must be 1-65535".to_owned(),
                }
                .into());
            }
        }

        if self.cloudtrail.enabled {
            if self.cloudtrail.spool_dir.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "cloudtrail.spool_dir".to_owned(),
                    reason: "must not be empty when cloudtrail is enabled".to_owned(),
                }
                .into());
            }

            if self.cloudtrail.poll_interval_secs == 0
                || self.cloudtrail.poll_interval_secs > MAX_INTERVAL_SECS
            {
                return Err(ConfigError::InvalidValue {
                    field: "cloudtrail.poll_interval_secs".to_owned(),
                    reason: format!("must be 1-{MAX_INTERVAL_SECS}"),
                }
                .into());
            }
        }

        for schema in &self.schemas {
            if schema.source_type.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "schema.source_type".to_owned(),
                    reason: "must not be empty".to_owned(),
                }
                .into());
            }
        }

        Ok(())
    }
}

impl Default for SentrypipeConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            queue: QueueConfig::default(),
            sink: SinkConfig::default(),
            health: HealthConfig::default(),
            syslog: SyslogConfig::default(),
            cloudtrail: CloudTrailConfig::default(),
            metrics: MetricsConfig::default(),
            schemas: default_schemas(),
        }
    }
}

/// Schemas shipped in the default configuration.
///
/// Deployments replace these with their own `[[schema]]` blocks; the
/// defaults cover the two reference adapters.
fn default_schemas() -> Vec<SchemaConfig> {
    vec![
        SchemaConfig {
            source_type: "aws_cloudtrail".to_owned(),
            required_fields: vec![
                "timestamp".to_owned(),
                "source_ip".to_owned(),
                "action".to_owned(),
                "user".to_owned(),
            ],
            optional_fields: vec!["source_host".to_owned(), "outcome".to_owned()],
            description: "AWS CloudTrail management events".to_owned(),
        },
        SchemaConfig {
            source_type: "syslog".to_owned(),
            required_fields: vec!["timestamp".to_owned(), "source_host".to_owned()],
            optional_fields: vec!["process".to_owned(), "severity".to_owned()],
            description: "RFC 3164/5424 syslog".to_owned(),
        },
    ]
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Log format (json, pretty).
    pub log_format: String,
    /// Base data directory.
    pub data_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            data_dir: "/var/lib/sentrypipe".to_owned(),
        }
    }
}

/// Ingestion queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of pending events before producers block.
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 10_000 }
    }
}

/// Durable sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Directory receiving NDJSON output files.
    pub output_dir: String,
    /// Batch size triggering a flush.
    pub batch_size: usize,
    /// Time-based flush interval (seconds).
    pub flush_interval_secs: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            output_dir: "/var/lib/sentrypipe/events".to_owned(),
            batch_size: 100,
            flush_interval_secs: 5,
        }
    }
}

/// Health monitor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Silence threshold per source (seconds).
    pub gap_threshold_secs: u64,
    /// Interval between health report log lines (seconds).
    pub report_interval_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            gap_threshold_secs: 600,
            report_interval_secs: 60,
        }
    }
}

/// Syslog listener adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyslogConfig {
    /// Whether the syslog listener is started.
    pub enabled: bool,
    /// UDP bind address (e.g. "0.0.0.0:5514").
    pub bind_addr: String,
    /// Maximum accepted datagram size (bytes, UDP caps at 65535).
    pub max_datagram_size: usize,
}

impl Default for SyslogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // Unprivileged port; 514 requires CAP_NET_BIND_SERVICE.
            bind_addr: "0.0.0.0:5514".to_owned(),
            max_datagram_size: 65_535,
        }
    }
}

/// Cloud audit-trail poller adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudTrailConfig {
    /// Whether the poller is started.
    pub enabled: bool,
    /// Spool directory containing downloaded trail objects.
    pub spool_dir: String,
    /// Only object names starting with this prefix are processed.
    pub prefix: String,
    /// Poll cycle interval (seconds).
    pub poll_interval_secs: u64,
}

impl Default for CloudTrailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            spool_dir: "/var/lib/sentrypipe/cloudtrail".to_owned(),
            prefix: String::new(),
            poll_interval_secs: 60,
        }
    }
}

/// Prometheus metrics endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether the metrics endpoint is started.
    pub enabled: bool,
    /// Listen address for the scrape endpoint.
    pub listen_addr: String,
    /// Listen port for the scrape endpoint.
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9184,
        }
    }
}

/// One `[[schema]]` block: the validation contract for a source type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Source type the schema applies to.
    pub source_type: String,
    /// Field names that must be set (directly or via `extra`).
    #[serde(default)]
    pub required_fields: Vec<String>,
    /// Field names the source may set; informational.
    #[serde(default)]
    pub optional_fields: Vec<String>,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
}

// --- environment override helpers ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}
