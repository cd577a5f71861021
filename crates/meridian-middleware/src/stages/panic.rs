//! Panic containment.
//!
//! Registered twice in the pre-dispatch pipeline: first, so nothing escapes
//! to the connection task, and again after logging, so the panic is recorded
//! inside the request span. The inner instance turns the panic into a normal
//! 500 response, which the outer instance then passes through untouched.

use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response, ResponseExt};
use futures_util::FutureExt;
use meridian_core::CloudError;
use std::any::Any;
use std::panic::AssertUnwindSafe;

/// Converts a panic anywhere downstream into `500 InternalServerError`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanicMiddleware;

impl PanicMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

impl Middleware for PanicMiddleware {
    fn name(&self) -> &'static str {
        "panic"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let method = request.method().clone();
            let path = request.uri().path().to_string();

            match AssertUnwindSafe(next.run(ctx, request)).catch_unwind().await {
                Ok(response) => response,
                Err(payload) => {
                    tracing::error!(
                        %method,
                        %path,
                        panic = panic_message(payload.as_ref()),
                        "panic while serving request"
                    );
                    meridian_telemetry::record_panic();
                    Response::cloud_error(&CloudError::internal_server_error())
                }
            }
        })
    }
}
