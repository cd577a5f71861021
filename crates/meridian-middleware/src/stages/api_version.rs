//! `api-version` query parameter validation.

use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response, ResponseExt};
use http::Uri;
use meridian_core::api::cluster_resource_type;
use meridian_core::headers::API_VERSION_PARAMETER;
use meridian_core::{attributes, ApiRegistry, CloudError, ResourceId};
use opentelemetry::KeyValue;

/// The first value of query parameter `name`, if present and non-empty.
pub fn query_param<'u>(uri: &'u Uri, name: &str) -> Option<&'u str> {
    uri.query()?
        .split('&')
        .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// Requires a registered `api-version` on every request it sees.
#[derive(Debug, Clone)]
pub struct ApiVersionMiddleware {
    registry: ApiRegistry,
}

impl ApiVersionMiddleware {
    /// Creates the stage over the accepted versions.
    pub fn new(registry: ApiRegistry) -> Self {
        Self { registry }
    }

    fn resource_type_name(ctx: &RequestContext, request: &Request) -> String {
        if let Some(resource_id) = ctx.resource_id() {
            return resource_id.resource_type().to_string();
        }
        let path = ctx.original_path().unwrap_or_else(|| request.uri().path());
        ResourceId::parse(path).map_or_else(
            |_| cluster_resource_type().to_string(),
            |id| id.resource_type().to_string(),
        )
    }
}

impl Middleware for ApiVersionMiddleware {
    fn name(&self) -> &'static str {
        "api_version"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let Some(version) = query_param(request.uri(), API_VERSION_PARAMETER).map(str::to_string)
            else {
                return Response::cloud_error(&CloudError::invalid_parameter_missing(
                    API_VERSION_PARAMETER,
                ));
            };

            if !self.registry.is_supported(&version) {
                let resource_type = Self::resource_type_name(ctx, &request);
                return Response::cloud_error(&CloudError::unsupported_api_version(
                    &resource_type,
                    &version,
                ));
            }

            if let Some(span) = ctx.span() {
                span.record("api_version", version.as_str());
            }
            ctx.set_span_attribute(KeyValue::new(attributes::API_VERSION, version.clone()));
            ctx.set_api_version(version);

            next.run(ctx, request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{create_test_request, StatusHandler};
    use http::StatusCode;

    const CLUSTER: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourcegroups/rg/providers/microsoft.redhatopenshift/hcpopenshiftclusters/dev";

    async fn run(uri: &str) -> (Response, RequestContext) {
        let mut ctx = RequestContext::new();
        let handler = StatusHandler(StatusCode::OK);
        let response = ApiVersionMiddleware::new(ApiRegistry::default())
            .process(&mut ctx, create_test_request("GET", uri), Next::handler(&handler))
            .await;
        (response, ctx)
    }

    #[test]
    fn test_query_param() {
        let uri: Uri = "/x?a=1&api-version=2024-06-10-preview&flag".parse().unwrap();
        assert_eq!(query_param(&uri, "api-version"), Some("2024-06-10-preview"));
        assert_eq!(query_param(&uri, "a"), Some("1"));
        assert_eq!(query_param(&uri, "flag"), None);
        assert_eq!(query_param(&uri, "missing"), None);
    }

    #[tokio::test]
    async fn test_missing_version() {
        let (response, _) = run(CLUSTER).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers().get("x-ms-error-code").unwrap(), "InvalidParameter");
    }

    #[tokio::test]
    async fn test_unsupported_version() {
        let (response, _) = run(&format!("{CLUSTER}?api-version=1999-01-01")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers().get("x-ms-error-code").unwrap(), "InvalidResourceType");
    }

    #[tokio::test]
    async fn test_supported_version_stored() {
        let (response, ctx) = run(&format!("{CLUSTER}?api-version=2024-06-10-preview")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(ctx.api_version(), Some("2024-06-10-preview"));
    }
}
