//! Fills in a missing `Referer`.
//!
//! Operation URLs handed back to the caller are built from the Referer's
//! scheme and authority, so every request needs one by the time a handler
//! runs.

use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use http::header::{HOST, REFERER};
use http::HeaderValue;

/// Synthesizes `Referer` from the `Host` header and request URI.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefererMiddleware;

impl RefererMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn synthesize(request: &Request) -> Option<HeaderValue> {
        let uri = request.uri();
        let authority = uri
            .authority()
            .map(|a| a.as_str().to_string())
            .or_else(|| {
                request
                    .headers()
                    .get(HOST)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            })?;
        let scheme = uri.scheme_str().unwrap_or("https");
        let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
        HeaderValue::from_str(&format!("{scheme}://{authority}{path_and_query}")).ok()
    }
}

impl Middleware for RefererMiddleware {
    fn name(&self) -> &'static str {
        "referer"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        mut request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            if !request.headers().contains_key(REFERER) {
                if let Some(referer) = Self::synthesize(&request) {
                    request.headers_mut().insert(REFERER, referer);
                }
            }
            next.run(ctx, request).await
        })
    }
}
