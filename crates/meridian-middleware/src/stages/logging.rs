//! Per-request logging.
//!
//! [`LoggingMiddleware`] opens the `request` span every later log line is
//! recorded in and logs the request and response. [`LoggingPostMuxMiddleware`]
//! runs after route matching and fills in the span fields that only the
//! matched path parameters can supply.

use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response, ResponseExt};
use http::header::{LOCATION, REFERER, RETRY_AFTER, USER_AGENT};
use http::HeaderMap;
use meridian_core::{attributes, headers, ResourceId};
use opentelemetry::KeyValue;
use tracing::field::Empty;
use tracing::Instrument;

/// Path parameter holding the subscription ID.
pub const SUBSCRIPTION_ID_PARAM: &str = "subscriptionid";
/// Path parameter holding the resource group name.
pub const RESOURCE_GROUP_PARAM: &str = "resourcegroupname";
/// Path parameter holding the top-level resource name.
pub const RESOURCE_NAME_PARAM: &str = "resourcename";

fn header_str<'h>(map: &'h HeaderMap, name: &http::HeaderName) -> &'h str {
    map.get(name).and_then(|v| v.to_str().ok()).unwrap_or_default()
}

/// Opens the request span and logs `request received` / `response complete`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMiddleware;

impl LoggingMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for LoggingMiddleware {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let path = ctx
                .original_path()
                .map_or_else(|| request.uri().path().to_string(), str::to_string);

            let span = tracing::info_span!(
                "request",
                method = %request.method(),
                path = %path,
                request_id = Empty,
                client_request_id = Empty,
                correlation_request_id = Empty,
                subscription_id = Empty,
                resource_group = Empty,
                resource_name = Empty,
                api_version = Empty,
            );
            if let Some(correlation) = ctx.correlation() {
                span.record("request_id", tracing::field::display(correlation.request_id));
                span.record("client_request_id", correlation.client_request_id.as_str());
                span.record("correlation_request_id", correlation.correlation_request_id.as_str());
            }
            // Best effort: plenty of routes are not resource paths.
            if let Ok(resource_id) = ResourceId::parse(&path) {
                if !resource_id.subscription_id().is_empty() {
                    span.record("subscription_id", resource_id.subscription_id());
                }
                if !resource_id.resource_group_name().is_empty() {
                    span.record("resource_group", resource_id.resource_group_name());
                }
                if !resource_id.name().is_empty()
                    && !resource_id.is_subscription()
                    && !resource_id.is_resource_group()
                {
                    span.record("resource_name", resource_id.name());
                }
            }
            ctx.set_span(span.clone());

            async move {
                let request_headers = request.headers();
                tracing::info!(
                    query = request.uri().query().unwrap_or_default(),
                    referer = header_str(request_headers, &REFERER),
                    user_agent = header_str(request_headers, &USER_AGENT),
                    remote_addr = ?ctx.remote_addr(),
                    "request received"
                );

                let response = next.run(ctx, request).await;

                let response_headers = response.headers();
                tracing::info!(
                    status = response.status().as_u16(),
                    body_read_bytes = ctx.body().map_or(0, |b| b.len()),
                    body_written_bytes = response.body_len(),
                    duration_secs = ctx.elapsed().as_secs_f64(),
                    azure_async_operation = header_str(response_headers, &headers::ASYNC_OPERATION),
                    location = header_str(response_headers, &LOCATION),
                    retry_after = header_str(response_headers, &RETRY_AFTER),
                    error_code = header_str(response_headers, &headers::ERROR_CODE),
                    "response complete"
                );
                response
            }
            .instrument(span)
            .await
        })
    }
}

/// Records route parameters on the request span and the server span.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPostMuxMiddleware;

impl LoggingPostMuxMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for LoggingPostMuxMiddleware {
    fn name(&self) -> &'static str {
        "logging_post_mux"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let fields = [
                (SUBSCRIPTION_ID_PARAM, "subscription_id", attributes::SUBSCRIPTION_ID),
                (RESOURCE_GROUP_PARAM, "resource_group", attributes::RESOURCE_GROUP_NAME),
                (RESOURCE_NAME_PARAM, "resource_name", attributes::RESOURCE_NAME),
            ];
            for (param, field, attribute) in fields {
                let Some(value) = ctx.path_param(param).filter(|v| !v.is_empty()) else {
                    continue;
                };
                if let Some(span) = ctx.span() {
                    span.record(field, value);
                }
                ctx.set_span_attribute(KeyValue::new(attribute, value.to_string()));
            }
            next.run(ctx, request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PathParams;
    use crate::test_util::{create_test_request, StatusHandler};
    use http::StatusCode;

    #[tokio::test]
    async fn test_span_stored() {
        let mut ctx = RequestContext::new()
            .with_original_path("/subscriptions/ABC/resourceGroups/RG");
        let handler = StatusHandler(StatusCode::OK);
        let response = LoggingMiddleware::new()
            .process(&mut ctx, create_test_request("GET", "/subscriptions/abc/resourcegroups/rg"), Next::handler(&handler))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(ctx.span().is_some());
    }

    #[tokio::test]
    async fn test_post_mux_without_span() {
        let mut params = PathParams::new();
        params.insert(SUBSCRIPTION_ID_PARAM.to_string(), "sub".to_string());
        let mut ctx = RequestContext::new().with_path_params(params);
        let handler = StatusHandler(StatusCode::NO_CONTENT);
        let response = LoggingPostMuxMiddleware::new()
            .process(&mut ctx, create_test_request("GET", "/x"), Next::handler(&handler))
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_header_str() {
        let mut map = HeaderMap::new();
        map.insert(RETRY_AFTER, http::HeaderValue::from_static("10"));
        assert_eq!(header_str(&map, &RETRY_AFTER), "10");
        assert_eq!(header_str(&map, &LOCATION), "");
    }
}
