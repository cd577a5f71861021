//! Resource ID extraction after routing.

use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use meridian_core::{attributes, ResourceId};
use opentelemetry::KeyValue;

/// Parses the original path into a [`ResourceId`] and stores it.
///
/// A path that does not parse is logged at warn; handlers that need the ID
/// report its absence themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceIdMiddleware;

impl ResourceIdMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for ResourceIdMiddleware {
    fn name(&self) -> &'static str {
        "resource_id"
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

            match ResourceId::parse(&path) {
                Ok(resource_id) => {
                    ctx.set_span_attribute(KeyValue::new(
                        attributes::CLOUD_RESOURCE_ID,
                        resource_id.to_string(),
                    ));
                    ctx.set_span_attribute(KeyValue::new(
                        attributes::RESOURCE_TYPE,
                        resource_id.resource_type().to_string(),
                    ));
                    ctx.set_resource_id(resource_id);
                }
                Err(err) => {
                    tracing::warn!(path = %path, error = %err, "failed to parse resource ID");
                }
            }
            next.run(ctx, request).await
        })
    }
}
