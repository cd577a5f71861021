//! Observability for the Meridian frontend.
//!
//! [`init_telemetry`] brings up three independent pieces:
//!
//! - structured logs via `tracing-subscriber` ([`logging`])
//! - Prometheus metrics via the `metrics` facade ([`metrics`])
//! - OpenTelemetry spans exported over OTLP, plus W3C context propagation
//!   ([`tracing`])
//!
//! ```rust,ignore
//! let config = TelemetryConfig::builder()
//!     .service_name("meridian-frontend")
//!     .environment("production")
//!     .build();
//! let _guard = meridian_telemetry::init_telemetry(config)?;
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod tracing;

pub use self::config::{ServiceIdentity, TelemetryConfig, TelemetryConfigBuilder};
pub use self::error::TelemetryError;
pub use self::logging::{init_logging, LogConfig, LogOutput};
pub use self::metrics::{
    init_metrics, record_audit_failure, record_lock_acquisition, record_panic, record_request,
    render_metrics, InFlightGuard, MetricsConfig,
};
pub use self::tracing::{extract_context, init_tracing, install_propagators, TracingConfig};

use opentelemetry_sdk::trace::TracerProvider;

/// Result alias for telemetry setup.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Owns the span exporter; flushes and shuts it down when dropped.
#[must_use = "dropping the guard stops span export"]
pub struct TelemetryGuard {
    spans: Option<TracerProvider>,
}

impl TelemetryGuard {
    /// Whether spans are being exported.
    #[must_use]
    pub fn exporting_spans(&self) -> bool {
        self.spans.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        let Some(provider) = self.spans.take() else {
            return;
        };
        // The subscriber may already be gone at process exit.
        for err in provider.force_flush().into_iter().filter_map(Result::err) {
            eprintln!("span flush failed: {err}");
        }
        if let Err(err) = provider.shutdown() {
            eprintln!("span exporter shutdown failed: {err}");
        }
    }
}

/// Installs logging, then metrics, then propagation and span export.
///
/// # Errors
///
/// Returns the first subsystem failure.
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryResult<TelemetryGuard> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    install_propagators();
    let spans = init_tracing(&config.tracing, &config.identity)?;

    ::tracing::info!(
        service = %config.identity.name,
        version = %config.identity.version,
        environment = %config.identity.environment,
        span_export = spans.is_some(),
        metrics = config.metrics.enabled,
        "telemetry initialized"
    );

    Ok(TelemetryGuard { spans })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_without_exporter() {
        let guard = TelemetryGuard { spans: None };
        assert!(!guard.exporting_spans());
        drop(guard);
    }
}
