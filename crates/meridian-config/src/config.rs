//! The root [`FrontendConfig`] type.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::{
    ApiConfig, AuditConfig, ConfigError, LockConfig, LogFormat, ServerConfig, TelemetrySection,
};

/// Complete frontend configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to layer files and environment
/// variables over the defaults.
///
/// ```
/// use meridian_config::FrontendConfig;
///
/// let config = FrontendConfig::default();
/// assert_eq!(config.lock.ttl_secs, 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct FrontendConfig {
    /// Listeners and request handling.
    #[serde(default)]
    pub server: ServerConfig,

    /// Subscription lock.
    #[serde(default)]
    pub lock: LockConfig,

    /// Registered API versions.
    #[serde(default)]
    pub api: ApiConfig,

    /// Audit.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Logging, tracing and metrics.
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl FrontendConfig {
    /// Checks values that serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_socket_addr("server.listen_addr", &self.server.listen_addr)?;
        if self.telemetry.metrics.enabled {
            check_socket_addr("server.metrics_addr", &self.server.metrics_addr)?;
        }

        if self.server.location.trim().is_empty() {
            return Err(ConfigError::invalid("server.location", "must not be empty"));
        }
        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "server.request_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.lock.ttl_secs == 0 {
            return Err(ConfigError::invalid("lock.ttl_secs", "must be greater than zero"));
        }
        if self.lock.retry_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "lock.retry_interval_ms",
                "must be greater than zero",
            ));
        }

        if self.api.versions.is_empty() {
            return Err(ConfigError::invalid(
                "api.versions",
                "at least one API version must be registered",
            ));
        }

        if !(0.0..=1.0).contains(&self.telemetry.tracing.sampling_ratio) {
            return Err(ConfigError::invalid(
                "telemetry.tracing.sampling_ratio",
                "must be between 0.0 and 1.0",
            ));
        }
        if self.telemetry.tracing.enabled && self.telemetry.tracing.otlp_endpoint.is_none() {
            return Err(ConfigError::invalid(
                "telemetry.tracing.otlp_endpoint",
                "must be set when tracing is enabled",
            ));
        }

        Ok(())
    }

    /// Development preset: pretty debug logs.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.server.listen_addr = "127.0.0.1:8443".to_string();
        config.server.metrics_addr = "127.0.0.1:8081".to_string();
        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = LogFormat::Pretty;
        config
    }

    /// Converts the telemetry section into what
    /// [`meridian_telemetry::init_telemetry`] expects.
    pub fn telemetry_config(&self) -> meridian_telemetry::TelemetryConfig {
        let section = &self.telemetry;

        let logging = meridian_telemetry::LogConfig {
            enabled: section.logging.enabled,
            level: section.logging.level.clone(),
            output: match section.logging.format {
                LogFormat::Json => meridian_telemetry::LogOutput::Json,
                LogFormat::Pretty => meridian_telemetry::LogOutput::Pretty,
            },
            ..meridian_telemetry::LogConfig::default()
        };
        let metrics = meridian_telemetry::MetricsConfig {
            enabled: section.metrics.enabled,
            ..meridian_telemetry::MetricsConfig::default()
        };
        let tracing = meridian_telemetry::TracingConfig {
            enabled: section.tracing.enabled,
            otlp_endpoint: section.tracing.otlp_endpoint.clone(),
            sample_ratio: section.tracing.sampling_ratio,
        };

        meridian_telemetry::TelemetryConfig::builder()
            .service_name(&section.service_name)
            .environment(&section.environment)
            .logging(logging)
            .metrics(metrics)
            .tracing(tracing)
            .build()
    }
}

fn check_socket_addr(field: &'static str, value: &str) -> Result<(), ConfigError> {
    value
        .parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|_| ConfigError::invalid(field, format!("invalid socket address: {value}")))
}
