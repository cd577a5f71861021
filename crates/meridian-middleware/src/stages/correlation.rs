//! Correlation identifiers.
//!
//! The request ID is always minted here; the client and correlation request
//! IDs are passed through verbatim. All three become baggage on the
//! OpenTelemetry context so they propagate to downstream calls.

use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use http::HeaderValue;
use meridian_core::{attributes, headers, CorrelationData};
use opentelemetry::baggage::BaggageExt;
use opentelemetry::KeyValue;

/// Trace attributes and baggage entries for a set of correlation IDs.
pub fn correlation_attributes(correlation: &CorrelationData) -> Vec<KeyValue> {
    vec![
        KeyValue::new(attributes::REQUEST_ID, correlation.request_id.to_string()),
        KeyValue::new(
            attributes::CLIENT_REQUEST_ID,
            correlation.client_request_id.clone(),
        ),
        KeyValue::new(
            attributes::CORRELATION_ID,
            correlation.correlation_request_id.clone(),
        ),
    ]
}

/// Whether the caller asked for its client request ID back.
fn wants_client_request_id(request: &Request) -> bool {
    request
        .headers()
        .get(headers::RETURN_CLIENT_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// Builds [`CorrelationData`] and stamps `x-ms-request-id` on the response.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationMiddleware;

impl CorrelationMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for CorrelationMiddleware {
    fn name(&self) -> &'static str {
        "correlation"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let correlation = CorrelationData::from_headers(request.headers());
            let echo = wants_client_request_id(&request);

            let parent = ctx
                .otel_context()
                .cloned()
                .unwrap_or_else(opentelemetry::Context::current);
            ctx.set_otel_context(parent.with_baggage(correlation_attributes(&correlation)));
            ctx.set_correlation(correlation.clone());

            let mut response = next.run(ctx, request).await;

            if let Ok(value) = HeaderValue::from_str(&correlation.request_id.to_string()) {
                response.headers_mut().insert(headers::REQUEST_ID, value);
            }
            if echo {
                if let Ok(value) = HeaderValue::from_str(&correlation.client_request_id) {
                    response.headers_mut().insert(headers::CLIENT_REQUEST_ID, value);
                }
            }
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{create_test_request, StatusHandler};
    use http::StatusCode;

    #[tokio::test]
    async fn test_baggage_and_context() {
        let mut request = create_test_request("GET", "/x");
        request
            .headers_mut()
            .insert(headers::CORRELATION_REQUEST_ID, HeaderValue::from_static("corr"));

        let mut ctx = RequestContext::new();
        let handler = StatusHandler(StatusCode::OK);
        let response = CorrelationMiddleware::new()
            .process(&mut ctx, request, Next::handler(&handler))
            .await;

        let correlation = ctx.correlation().unwrap();
        assert_eq!(correlation.correlation_request_id, "corr");
        assert_eq!(
            response.headers().get(headers::REQUEST_ID).unwrap(),
            correlation.request_id.to_string().as_str()
        );

        let baggage = ctx.otel_context().unwrap().baggage();
        assert_eq!(
            baggage.get(attributes::CORRELATION_ID).map(ToString::to_string),
            Some("corr".to_string())
        );
        assert!(baggage.get(attributes::REQUEST_ID).is_some());
    }

    #[test]
    fn test_return_flag_is_case_insensitive() {
        for value in ["true", "TRUE", "True"] {
            let mut request = create_test_request("GET", "/x");
            request.headers_mut().insert(
                headers::RETURN_CLIENT_REQUEST_ID,
                HeaderValue::from_static(value),
            );
            assert!(wants_client_request_id(&request), "{value}");
        }

        let mut request = create_test_request("GET", "/x");
        request
            .headers_mut()
            .insert(headers::RETURN_CLIENT_REQUEST_ID, HeaderValue::from_static("yes"));
        assert!(!wants_client_request_id(&request));
        assert!(!wants_client_request_id(&create_test_request("GET", "/x")));
    }
}
