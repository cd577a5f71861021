//! Configuration sections.
//!
//! Every section denies unknown fields and takes omitted ones from its
//! `Default` impl.

use meridian_core::api::DEFAULT_API_VERSIONS;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Listener and request handling settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// API listener.
    pub listen_addr: String,
    /// Prometheus `/metrics` listener.
    pub metrics_addr: String,
    /// Azure region served, reported by `/location` and stamped on clusters.
    pub location: String,
    /// How long shutdown waits for open connections.
    pub shutdown_timeout_secs: u64,
    /// Upper bound on one request, body read included.
    pub request_timeout_ms: u64,
}

impl ServerConfig {
    /// Graceful shutdown timeout.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8443".to_string(),
            metrics_addr: "0.0.0.0:8081".to_string(),
            location: "eastus".to_string(),
            shutdown_timeout_secs: 30,
            request_timeout_ms: 60_000,
        }
    }
}

/// Subscription lock settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LockConfig {
    /// Lease duration. Also bounds how long a request waits for the lock.
    pub ttl_secs: u64,
    /// Delay between acquisition attempts.
    pub retry_interval_ms: u64,
}

impl LockConfig {
    /// Lease duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Delay between acquisition attempts.
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 10,
            retry_interval_ms: 1000,
        }
    }
}

/// Accepted `api-version` values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// Registered versions.
    pub versions: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            versions: DEFAULT_API_VERSIONS.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Audit settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    /// Emit an audit record per request.
    pub enabled: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Metrics settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and open the metrics listener.
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Span export settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TracingConfig {
    /// Export spans over OTLP.
    pub enabled: bool,
    /// Collector endpoint, required when enabled.
    pub otlp_endpoint: Option<String>,
    /// Fraction of root spans sampled.
    pub sampling_ratio: f64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: None,
            sampling_ratio: 1.0,
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable.
    Pretty,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Install the log subscriber.
    pub enabled: bool,
    /// `EnvFilter` directive.
    pub level: String,
    /// Line format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetrySection {
    /// Service name on spans and log lines.
    pub service_name: String,
    /// Deployment environment.
    pub environment: String,
    /// Logging.
    pub logging: LoggingConfig,
    /// Tracing.
    pub tracing: TracingConfig,
    /// Metrics.
    pub metrics: MetricsConfig,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            service_name: "meridian-frontend".to_string(),
            environment: "development".to_string(),
            logging: LoggingConfig::default(),
            tracing: TracingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_durations() {
        let lock = LockConfig {
            ttl_secs: 15,
            retry_interval_ms: 250,
        };
        assert_eq!(lock.ttl(), Duration::from_secs(15));
        assert_eq!(lock.retry_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let server: ServerConfig = toml::from_str(r#"location = "westus3""#).unwrap();
        assert_eq!(server.location, "westus3");
        assert_eq!(server.listen_addr, ServerConfig::default().listen_addr);
    }

    #[test]
    fn test_nested_section_defaults() {
        let telemetry: TelemetrySection = toml::from_str("[logging]\nformat = \"pretty\"\n").unwrap();
        assert_eq!(telemetry.logging.format, LogFormat::Pretty);
        assert_eq!(telemetry.logging.level, "info");
        assert!(telemetry.metrics.enabled);
    }
}
