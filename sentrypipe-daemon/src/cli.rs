//! CLI argument definitions for sentrypipe-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Sentrypipe security telemetry ingestion daemon.
///
/// Runs the source adapters (syslog listener, audit-trail poller) and the
/// ingestion pipeline, persisting validated events as NDJSON.
#[derive(Parser, Debug)]
#[command(name = "sentrypipe-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to the sentrypipe.toml configuration file.
    #[arg(short, long, default_value = "/etc/sentrypipe/sentrypipe.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate the configuration file and exit without starting.
    #[arg(long)]
    pub validate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = DaemonCli::parse_from(["sentrypipe-daemon"]);
        assert_eq!(
            cli.config,
            PathBuf::from("/etc/sentrypipe/sentrypipe.toml")
        );
        assert!(cli.log_level.is_none());
        assert!(!cli.validate);
    }

    #[test]
    fn overrides_parse() {
        let cli = DaemonCli::parse_from([
            "sentrypipe-daemon",
            "--config",
            "/tmp/test.toml",
            "--log-level",
            "debug",
            "--log-format",
            "pretty",
            "--validate",
        ]);
        assert_eq!(cli.config, PathBuf::from("/tmp/test.toml"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.log_format.as_deref(), Some("pretty"));
        assert!(cli.validate);
    }
}
