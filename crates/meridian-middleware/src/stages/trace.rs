//! OpenTelemetry server spans.
//!
//! The span is a child of whatever W3C context arrived with the request.
//! Its name starts as the bare method and becomes `METHOD route` once the mux
//! has matched a pattern.

use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::stages::correlation::correlation_attributes;
use crate::types::{Request, Response};
use opentelemetry::trace::{FutureExt, SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::KeyValue;
use opentelemetry_semantic_conventions::trace as semconv;

/// Starts and finishes the server span for each request.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMiddleware;

impl TracingMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for TracingMiddleware {
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let method = request.method().to_string();
            let tracer = meridian_telemetry::tracing::tracer();
            let parent = ctx
                .otel_context()
                .cloned()
                .unwrap_or_else(opentelemetry::Context::current);

            let mut span_attributes = vec![
                KeyValue::new(semconv::HTTP_REQUEST_METHOD, method.clone()),
                KeyValue::new(semconv::URL_PATH, request.uri().path().to_string()),
            ];
            if let Some(correlation) = ctx.correlation() {
                span_attributes.extend(correlation_attributes(correlation));
            }

            let span = tracer
                .span_builder(method.clone())
                .with_kind(SpanKind::Server)
                .with_attributes(span_attributes)
                .start_with_context(&tracer, &parent);
            let cx = parent.with_span(span);
            ctx.set_otel_context(cx.clone());

            let response = next.run(ctx, request).with_context(cx.clone()).await;

            let span = cx.span();
            if let Some(route) = ctx.route_pattern() {
                span.update_name(format!("{method} {route}"));
                span.set_attribute(KeyValue::new(semconv::HTTP_ROUTE, route.to_string()));
            }
            let status = response.status();
            span.set_attribute(KeyValue::new(
                semconv::HTTP_RESPONSE_STATUS_CODE,
                i64::from(status.as_u16()),
            ));
            if status.is_server_error() {
                span.set_status(Status::error(status.to_string()));
            }
            span.end();

            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{create_test_request, StatusHandler};
    use http::StatusCode;
    use meridian_core::CorrelationData;

    #[tokio::test]
    async fn test_context_installed_without_provider() {
        let mut ctx = RequestContext::new().with_correlation(CorrelationData::from_headers(
            &http::HeaderMap::new(),
        ));
        let handler = StatusHandler(StatusCode::BAD_GATEWAY);
        let response = TracingMiddleware::new()
            .process(&mut ctx, create_test_request("GET", "/x"), Next::handler(&handler))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(ctx.otel_context().is_some());
    }
}
