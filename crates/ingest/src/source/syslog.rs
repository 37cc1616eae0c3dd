//! UDP syslog adapter.
//!
//! Streaming adapter: binds a UDP socket and converts each datagram into a
//! [`NormalizedEvent`] best-effort. The PRI prefix, when present, is decoded
//! per RFC 5424 for severity; hostname and process are extracted from the
//! RFC 3164 token layout. Fields the datagram does not carry stay unset and
//! are left to schema validation downstream.
//!
//! A malformed datagram is dropped with a warning; the listener keeps
//! running. Failing to bind the socket ends the adapter with an error.

use std::net::IpAddr;

use chrono::Utc;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use sentrypipe_core::error::ParseError;
use sentrypipe_core::event::{NormalizedEvent, SOURCE_SYSLOG, Severity};
use sentrypipe_core::metrics as m;

use super::{AdapterStatus, SourceAdapter};
use crate::error::IngestError;
use crate::queue::QueueHandle;

/// Maximum valid RFC 5424 PRI value.
/// facility max 23 * 8 + severity max 7 = 191
const MAX_SYSLOG_PRI: u8 = 191;

/// UDP syslog listener pushing events into the ingestion queue.
pub struct SyslogUdpAdapter {
    config: sentrypipe_core::config::SyslogConfig,
    queue: QueueHandle,
    status: AdapterStatus,
    received_count: u64,
    dropped_count: u64,
}

impl SyslogUdpAdapter {
    /// Create a listener from its config section and a queue handle.
    pub fn new(config: sentrypipe_core::config::SyslogConfig, queue: QueueHandle) -> Self {
        Self {
            config,
            queue,
            status: AdapterStatus::Idle,
            received_count: 0,
            dropped_count: 0,
        }
    }

    /// Datagrams received so far.
    pub fn received_count(&self) -> u64 {
        self.received_count
    }

    /// Malformed datagrams dropped so far.
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count
    }

    /// Current lifecycle status.
    pub fn status(&self) -> &AdapterStatus {
        &self.status
    }

    /// Convert one syslog datagram into a normalized event.
    ///
    /// Best-effort: a missing or malformed PRI leaves severity unknown, a
    /// short message leaves host/process unset. Only an empty datagram is
    /// an error.
    pub fn parse_datagram(raw: &[u8], peer_ip: IpAddr) -> Result<NormalizedEvent, ParseError> {
        let text = String::from_utf8_lossy(raw);
        let text = text.trim();
        if text.is_empty() {
            return Err(ParseError::Record {
                source_type: SOURCE_SYSLOG.to_owned(),
                reason: "empty datagram".to_owned(),
            });
        }

        let (severity, rest) = match strip_pri(text) {
            Some((pri, rest)) => (severity_from_pri(pri), rest),
            None => (Severity::Unknown, text),
        };

        let mut event = NormalizedEvent::new(SOURCE_SYSLOG, Utc::now(), text);
        event.severity = severity;
        event.source_ip = Some(peer_ip.to_string());
        event.action = Some("log_entry".to_owned());

        // RFC 3164 layout: "Mmm dd hh:mm:ss host tag: msg"
        let parts: Vec<&str> = rest.splitn(5, ' ').collect();
        if parts.len() > 3 && !parts[3].is_empty() {
            event.source_host = Some(parts[3].to_owned());
        }
        if parts.len() > 4 {
            let process = parts[4].split(':').next().unwrap_or_default();
            if !process.is_empty() {
                event.process = Some(process.to_owned());
            }
        }

        Ok(event)
    }
}

impl SourceAdapter for SyslogUdpAdapter {
    fn source_type(&self) -> &'static str {
        SOURCE_SYSLOG
    }

    async fn run(mut self, cancel: CancellationToken) -> Result<(), IngestError> {
        let socket = UdpSocket::bind(&self.config.bind_addr).await.map_err(|e| {
            self.status = AdapterStatus::Error(e.to_string());
            IngestError::Adapter {
                source_type: SOURCE_SYSLOG.to_owned(),
                reason: format!("bind {} failed: {e}", self.config.bind_addr),
            }
        })?;

        tracing::info!(
            bind_addr = self.config.bind_addr.as_str(),
            "syslog listener started"
        );
        self.status = AdapterStatus::Running;

        let mut buf = vec![0u8; self.config.max_datagram_size];
        loop {
            tokio::select! {
                result = socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, peer)) => {
                            self.received_count += 1;
                            match Self::parse_datagram(&buf[..len], peer.ip()) {
                                Ok(event) => {
                                    if self.queue.push(event).await.is_err() {
                                        tracing::info!("queue closed, stopping syslog listener");
                                        break;
                                    }
                                }
                                Err(e) => {
                                    self.dropped_count += 1;
                                    metrics::counter!(
                                        m::ADAPTER_RECORDS_DROPPED_TOTAL,
                                        m::LABEL_SOURCE_TYPE => SOURCE_SYSLOG
                                    )
                                    .increment(1);
                                    tracing::warn!(
                                        peer = %peer,
                                        error = %e,
                                        "dropped malformed syslog datagram"
                                    );
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "syslog recv error, continuing");
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    tracing::info!("syslog listener received shutdown signal");
                    break;
                }
            }
        }

        self.status = AdapterStatus::Stopped;
        tracing::info!(
            received = self.received_count,
            dropped = self.dropped_count,
            "syslog listener stopped"
        );
        Ok(())
    }
}

/// Split a leading `<PRI>` prefix off a syslog message.
fn strip_pri(text: &str) -> Option<(u8, &str)> {
    let inner = text.strip_prefix('<')?;
    let end = inner.find('>')?;
    let pri: u8 = inner[..end].parse().ok()?;
    if pri > MAX_SYSLOG_PRI {
        return None;
    }
    Some((pri, inner[end + 1..].trim_start()))
}

/// Map an RFC 5424 severity (PRI % 8) onto the event severity set.
fn severity_from_pri(pri: u8) -> Severity {
    match pri % 8 {
        0..=2 => Severity::Critical,
        3 => Severity::High,
        4 => Severity::Medium,
        5 => Severity::Low,
        _ => Severity::Unknown,
    }
}
