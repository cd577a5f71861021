//! Telemetry settings.

use crate::logging::LogConfig;
use crate::metrics::MetricsConfig;
use crate::tracing::TracingConfig;

/// Who is emitting: stamped on the span resource and the startup event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    /// `service.name`.
    pub name: String,
    /// `service.version`.
    pub version: String,
    /// `deployment.environment`.
    pub environment: String,
}

impl Default for ServiceIdentity {
    fn default() -> Self {
        Self {
            name: "meridian-frontend".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Settings for logging, metrics and tracing together.
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Service identity.
    pub identity: ServiceIdentity,
    /// Logging.
    pub logging: LogConfig,
    /// Metrics.
    pub metrics: MetricsConfig,
    /// Span export.
    pub tracing: TracingConfig,
}

impl TelemetryConfig {
    /// Starts from the defaults.
    #[must_use]
    pub fn builder() -> TelemetryConfigBuilder {
        TelemetryConfigBuilder::default()
    }
}

/// Builder for [`TelemetryConfig`].
#[derive(Debug, Default)]
#[must_use]
pub struct TelemetryConfigBuilder {
    config: TelemetryConfig,
}

impl TelemetryConfigBuilder {
    /// Sets `service.name`.
    pub fn service_name(mut self, name: &str) -> Self {
        self.config.identity.name = name.to_string();
        self
    }

    /// Sets `service.version`.
    pub fn service_version(mut self, version: &str) -> Self {
        self.config.identity.version = version.to_string();
        self
    }

    /// Sets `deployment.environment`.
    pub fn environment(mut self, environment: &str) -> Self {
        self.config.identity.environment = environment.to_string();
        self
    }

    /// Replaces the logging settings.
    pub fn logging(mut self, logging: LogConfig) -> Self {
        self.config.logging = logging;
        self
    }

    /// Replaces the metrics settings.
    pub fn metrics(mut self, metrics: MetricsConfig) -> Self {
        self.config.metrics = metrics;
        self
    }

    /// Replaces the span export settings.
    pub fn tracing(mut self, tracing: TracingConfig) -> Self {
        self.config.tracing = tracing;
        self
    }

    /// Finishes the builder.
    #[must_use]
    pub fn build(self) -> TelemetryConfig {
        self.config
    }
}
