//! OpenTelemetry spans and W3C context propagation.
//!
//! Propagation works whether or not spans are exported: the trace stage
//! parents every server span on the `traceparent` the client sent, and
//! `baggage` rides along in the extracted context.

use crate::config::ServiceIdentity;
use crate::error::TelemetryError;
use crate::TelemetryResult;
use opentelemetry::propagation::{Extractor, TextMapCompositePropagator};
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use opentelemetry_sdk::trace::{Sampler, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use opentelemetry_semantic_conventions::attribute::{SERVICE_NAME, SERVICE_VERSION};

/// Instrumentation scope of frontend server spans.
pub const TRACER_NAME: &str = "meridian-frontend";

/// Span export settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TracingConfig {
    /// Export spans over OTLP/gRPC.
    pub enabled: bool,
    /// Collector endpoint, e.g. `http://localhost:4317`.
    pub otlp_endpoint: Option<String>,
    /// Fraction of new root traces kept, clamped to `0.0..=1.0`.
    pub sample_ratio: f64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: None,
            sample_ratio: 1.0,
        }
    }
}

impl TracingConfig {
    /// Sampled parents stay sampled; only new roots are subject to the ratio.
    fn sampler(&self) -> Sampler {
        let root = match self.sample_ratio {
            r if r >= 1.0 => Sampler::AlwaysOn,
            r if r <= 0.0 => Sampler::AlwaysOff,
            r => Sampler::TraceIdRatioBased(r),
        };
        Sampler::ParentBased(Box::new(root))
    }
}

fn resource(identity: &ServiceIdentity) -> Resource {
    Resource::new([
        KeyValue::new(SERVICE_NAME, identity.name.clone()),
        KeyValue::new(SERVICE_VERSION, identity.version.clone()),
        KeyValue::new("deployment.environment", identity.environment.clone()),
    ])
}

/// Sets the global propagator to W3C trace context plus baggage.
pub fn install_propagators() {
    global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]));
}

/// Starts span export and registers the provider globally.
///
/// Returns `None` when export is disabled; otherwise the provider, which the
/// caller flushes at shutdown.
///
/// # Errors
///
/// Fails when export is enabled without an endpoint or the exporter cannot be
/// built.
pub fn init_tracing(
    config: &TracingConfig,
    identity: &ServiceIdentity,
) -> TelemetryResult<Option<TracerProvider>> {
    if !config.enabled {
        return Ok(None);
    }
    let endpoint = config
        .otlp_endpoint
        .as_deref()
        .ok_or(TelemetryError::MissingEndpoint)?;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| TelemetryError::Exporter {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_sampler(config.sampler())
        .with_resource(resource(identity))
        .build();
    global::set_tracer_provider(provider.clone());

    Ok(Some(provider))
}

/// The tracer for server spans.
#[must_use]
pub fn tracer() -> global::BoxedTracer {
    global::tracer(TRACER_NAME)
}

/// Reads the remote parent and baggage from request headers.
pub fn extract_context(headers: &http::HeaderMap) -> opentelemetry::Context {
    global::get_text_map_propagator(|propagator| propagator.extract(&HeaderExtractor(headers)))
}

/// Exposes an `http::HeaderMap` to propagators.
pub struct HeaderExtractor<'a>(pub &'a http::HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key)?.to_str().ok()
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(http::HeaderName::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::baggage::BaggageExt;
    use opentelemetry::trace::TraceContextExt;

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert!(!config.enabled);
        assert!(config.otlp_endpoint.is_none());
        assert!(matches!(config.sampler(), Sampler::ParentBased(_)));
    }

    #[test]
    fn test_enabled_without_endpoint_is_rejected() {
        let config = TracingConfig {
            enabled: true,
            ..TracingConfig::default()
        };
        let result = init_tracing(&config, &ServiceIdentity::default());
        assert!(matches!(result, Err(TelemetryError::MissingEndpoint)));
    }

    #[test]
    fn test_disabled_tracing() {
        let result = init_tracing(&TracingConfig::default(), &ServiceIdentity::default());
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_header_extractor_skips_missing() {
        let mut headers = http::HeaderMap::new();
        headers.insert("traceparent", "test-value".parse().unwrap());

        let extractor = HeaderExtractor(&headers);
        assert_eq!(extractor.get("traceparent"), Some("test-value"));
        assert_eq!(extractor.get("tracestate"), None);
        assert_eq!(extractor.keys(), vec!["traceparent"]);
    }

    #[test]
    fn test_extract_remote_parent_and_baggage() {
        install_propagators();

        let mut headers = http::HeaderMap::new();
        headers.insert(
            "traceparent",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01".parse().unwrap(),
        );
        headers.insert("baggage", "tenant=contoso".parse().unwrap());

        let cx = extract_context(&headers);
        let span = cx.span();
        assert!(span.span_context().is_remote());
        assert_eq!(
            span.span_context().trace_id().to_string(),
            "4bf92f3577b34da6a3ce929d0e0e4736"
        );
        assert_eq!(
            cx.baggage().get("tenant").map(ToString::to_string),
            Some("contoso".to_string())
        );
    }
}
