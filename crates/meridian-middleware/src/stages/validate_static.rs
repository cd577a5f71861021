//! Static path validation ahead of routing.

use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response, ResponseExt};
use meridian_core::validate::validate_resource_id;
use meridian_core::ResourceId;

/// Rejects malformed subscription IDs, resource group names and resource
/// names before the mux runs.
///
/// Validation uses the original path so error messages echo the caller's
/// casing. Paths that are not resource IDs at all pass through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateStaticMiddleware;

impl ValidateStaticMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for ValidateStaticMiddleware {
    fn name(&self) -> &'static str {
        "validate_static"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let path = ctx.original_path().unwrap_or_else(|| request.uri().path());
            if let Ok(resource_id) = ResourceId::parse(path) {
                if let Err(err) = validate_resource_id(&resource_id) {
                    return Response::cloud_error(&err);
                }
            }
            next.run(ctx, request).await
        })
    }
}
