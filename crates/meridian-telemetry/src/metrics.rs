//! Prometheus metrics.
//!
//! The recorder is installed without its own HTTP listener; the frontend
//! serves [`render_metrics`] on the dedicated metrics address.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `frontend_http_requests_total` | Counter | `method`, `route`, `status` |
//! | `frontend_http_request_duration_seconds` | Histogram | `method`, `route` |
//! | `frontend_http_requests_in_flight` | Gauge | - |
//! | `frontend_lock_acquire_total` | Counter | `result` |
//! | `frontend_audit_failures_total` | Counter | - |
//! | `frontend_panics_total` | Counter | - |

use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

const REQUESTS_TOTAL: &str = "frontend_http_requests_total";
const REQUEST_DURATION: &str = "frontend_http_request_duration_seconds";
const REQUESTS_IN_FLIGHT: &str = "frontend_http_requests_in_flight";
const LOCK_ACQUISITIONS: &str = "frontend_lock_acquire_total";
const AUDIT_FAILURES: &str = "frontend_audit_failures_total";
const PANICS: &str = "frontend_panics_total";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Histogram buckets for request duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_buckets: vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
            ],
        }
    }
}

/// Installs the global Prometheus recorder.
///
/// Calling this again after a successful install is a no-op.
///
/// # Errors
///
/// Fails if the buckets are empty or another recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled || METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION.to_string()),
            &config.duration_buckets,
        )?
        .install_recorder()?;

    let _ = METRICS_HANDLE.set(handle);
    register_metric_descriptions();

    Ok(())
}

/// Renders metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(REQUESTS_TOTAL, "Total number of HTTP requests served");
    describe_histogram!(REQUEST_DURATION, "HTTP request duration in seconds");
    describe_gauge!(REQUESTS_IN_FLIGHT, "HTTP requests currently being processed");
    describe_counter!(LOCK_ACQUISITIONS, "Subscription lock acquisition attempts by result");
    describe_counter!(AUDIT_FAILURES, "Audit records that could not be delivered");
    describe_counter!(PANICS, "Handler panics converted to 500 responses");
}

/// Records a completed request.
///
/// `route` is the matched route pattern, never the raw path.
pub fn record_request(method: &str, route: &str, status_code: u16, duration: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!(
        REQUEST_DURATION,
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Records the outcome of a subscription lock acquisition
/// (`acquired`, `timeout` or `error`).
pub fn record_lock_acquisition(result: &'static str) {
    counter!(LOCK_ACQUISITIONS, "result" => result).increment(1);
}

/// Records an audit record that the sink rejected.
pub fn record_audit_failure() {
    counter!(AUDIT_FAILURES).increment(1);
}

/// Records a recovered handler panic.
pub fn record_panic() {
    counter!(PANICS).increment(1);
}

/// Guard that tracks one in-flight request.
///
/// Decrements the gauge on drop, including during unwinding.
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Increments the in-flight gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!(REQUESTS_IN_FLIGHT).increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(REQUESTS_IN_FLIGHT).decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert!(config.duration_buckets.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_record_functions_dont_panic() {
        let _guard = InFlightGuard::new();
        record_request("PUT", "/subscriptions/{subscriptionId}", 201, Duration::from_millis(10));
        record_lock_acquisition("acquired");
        record_audit_failure();
        record_panic();
    }

    #[test]
    fn test_disabled_metrics_install_nothing() {
        let config = MetricsConfig {
            enabled: false,
            ..MetricsConfig::default()
        };
        assert!(init_metrics(&config).is_ok());
    }

    #[test]
    fn test_render_after_init() {
        init_metrics(&MetricsConfig::default()).unwrap();
        record_request("GET", "/healthz", 200, Duration::from_millis(1));
        let rendered = render_metrics().unwrap();
        assert!(rendered.contains(REQUESTS_TOTAL));
    }
}
