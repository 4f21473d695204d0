//! Configuration types for ranger-dns.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::DnsError;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// DNS listener configuration.
    pub dns: DnsConfig,

    /// Ranger registry configuration.
    pub ranger: RangerConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// DNS listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Address for DNS server to listen on (UDP and TCP).
    pub listen_addr: SocketAddr,
}

/// How service nodes are fetched from the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Pull every service periodically and answer from a cache.
    #[default]
    Bulk,
    /// Ask the registry for one service on every query.
    PerService,
}

/// Ranger registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangerConfig {
    /// Registry base URL, e.g. `http://ranger.internal:8080`.
    pub endpoint: String,

    /// Reserved. Accepted for compatibility, does not filter anything yet.
    #[serde(default)]
    pub skip_data_from_replication_sources: bool,

    /// Fetch strategy.
    #[serde(default)]
    pub mode: FetchMode,

    /// Seconds between background refreshes (bulk mode).
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Upper bound for a single registry request, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_refresh_interval() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    5
}

impl RangerConfig {
    /// Config with the given endpoint and defaults for everything else.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            skip_data_from_replication_sources: false,
            mode: FetchMode::default(),
            refresh_interval_secs: default_refresh_interval(),
            request_timeout_secs: default_request_timeout(),
        }
    }

    /// Check the endpoint and intervals.
    pub fn validate(&self) -> Result<(), DnsError> {
        if self.endpoint.trim().is_empty() {
            return Err(DnsError::Config("endpoint can't be empty".to_string()));
        }
        EndpointInfo::parse(&self.endpoint)?;
        if self.refresh_interval_secs == 0 {
            return Err(DnsError::Config(
                "refresh_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(DnsError::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Refresh period as a `Duration`.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Request timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Parsed registry endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInfo {
    /// Base URL as configured, without a trailing slash.
    pub endpoint: String,
    /// Host part of the URL.
    pub host: String,
    /// Explicit port, or the scheme default.
    pub port: u16,
}

impl EndpointInfo {
    /// Parse a registry endpoint URL.
    ///
    /// Requires an `http`/`https` scheme and a host. The port falls back to
    /// the scheme default when the URL does not carry one.
    pub fn parse(endpoint: &str) -> Result<Self, DnsError> {
        let url = Url::parse(endpoint)
            .map_err(|e| DnsError::Config(format!("invalid endpoint {endpoint:?}: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(DnsError::Config(format!(
                "endpoint {endpoint:?} must use http or https"
            )));
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| DnsError::Config(format!("endpoint {endpoint:?} has no host")))?
            .to_string();

        let port = url
            .port_or_known_default()
            .ok_or_else(|| DnsError::Config(format!("endpoint {endpoint:?} has no port")))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            host,
            port,
        })
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "ranger_dns=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,

    /// OpenTelemetry configuration.
    #[serde(default)]
    pub opentelemetry: Option<OpenTelemetryConfig>,
}

/// OpenTelemetry exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenTelemetryConfig {
    /// OTLP endpoint (e.g., "http://localhost:4317").
    pub endpoint: String,

    /// Service name for traces.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
            opentelemetry: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "ranger-dns".to_string()
}
