//! Telemetry errors.

use thiserror::Error;

/// Why telemetry could not be brought up.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The log filter directive does not parse.
    #[error("invalid log filter: {0}")]
    InvalidFilter(#[from] tracing_subscriber::filter::ParseError),

    /// Another global subscriber was installed first.
    #[error("log subscriber already installed: {0}")]
    SubscriberInstalled(#[from] tracing_subscriber::util::TryInitError),

    /// The Prometheus recorder could not be built or installed.
    #[error("prometheus recorder: {0}")]
    Recorder(#[from] metrics_exporter_prometheus::BuildError),

    /// Span export is enabled without a collector endpoint.
    #[error("span export enabled without an OTLP endpoint")]
    MissingEndpoint,

    /// The OTLP span exporter could not be built.
    #[error("OTLP exporter for {endpoint}: {reason}")]
    Exporter {
        /// Collector endpoint.
        endpoint: String,
        /// Exporter error text.
        reason: String,
    },
}
