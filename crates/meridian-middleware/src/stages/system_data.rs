//! ARM system data header.

use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use meridian_core::{headers, SystemData};

/// Parses `x-ms-arm-resource-system-data` into the context.
///
/// A malformed header is logged and otherwise ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDataMiddleware;

impl SystemDataMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for SystemDataMiddleware {
    fn name(&self) -> &'static str {
        "system_data"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let raw = request
                .headers()
                .get(headers::ARM_RESOURCE_SYSTEM_DATA)
                .map(|v| v.as_bytes())
                .filter(|v| !v.is_empty());

            if let Some(raw) = raw {
                match serde_json::from_slice::<SystemData>(raw) {
                    Ok(system_data) => ctx.set_system_data(system_data),
                    Err(err) => tracing::warn!(error = %err, "ignoring malformed system data header"),
                }
            }
            next.run(ctx, request).await
        })
    }
}
