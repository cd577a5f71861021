//! Request body buffering and media-type enforcement.

use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response, ResponseExt};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::Method;
use http_body_util::{BodyExt, Full};
use meridian_core::api::MAX_REQUEST_BODY_BYTES;
use meridian_core::CloudError;

const JSON_MEDIA_TYPE: &str = "application/json";

/// Buffers bodies of `POST`, `PUT` and `PATCH` requests into the context.
///
/// Bodies over the size limit are rejected with `400 InvalidResource`, and
/// anything other than `application/json` with `415`. A request with neither
/// body nor `Content-Type` is let through.
#[derive(Debug, Clone, Copy)]
pub struct BodyMiddleware {
    max_bytes: usize,
}

impl BodyMiddleware {
    /// Creates the stage with the standard 4 MiB limit.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_bytes: MAX_REQUEST_BODY_BYTES,
        }
    }

    /// Overrides the size limit.
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

impl Default for BodyMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

fn accepts_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// The media type of a `Content-Type` value, parameters stripped.
pub(crate) fn media_type(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or_default().trim()
}

/// Checks the body and content type, returning the error to send on rejection.
pub(crate) fn check_body(body: &[u8], content_type: &str, max_bytes: usize) -> Result<(), CloudError> {
    if body.len() > max_bytes {
        return Err(CloudError::request_too_large(max_bytes));
    }
    if body.is_empty() && content_type.is_empty() {
        return Ok(());
    }
    if !media_type(content_type).eq_ignore_ascii_case(JSON_MEDIA_TYPE) {
        return Err(CloudError::unsupported_media_type(content_type));
    }
    Ok(())
}

impl Middleware for BodyMiddleware {
    fn name(&self) -> &'static str {
        "body"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            if !accepts_body(request.method()) {
                return next.run(ctx, request).await;
            }

            let (parts, body) = request.into_parts();
            let bytes: Bytes = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(never) => match never {},
            };

            let content_type = parts
                .headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            if let Err(err) = check_body(&bytes, content_type, self.max_bytes) {
                return Response::cloud_error(&err);
            }

            ctx.set_body(bytes.clone());
            next.run(ctx, Request::from_parts(parts, Full::new(bytes))).await
        })
    }
}
