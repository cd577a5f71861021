//! The [`Middleware`] and [`Handler`] traits and the [`Next`] continuation.
//!
//! A stage receives the mutable [`RequestContext`], the request and a
//! [`Next`] it may run at most once. Returning without running `next`
//! short-circuits every downstream stage and the handler.
//!
//! ```ignore
//! use meridian_middleware::{BoxFuture, Middleware, Next, Request, RequestContext, Response};
//!
//! struct Timing;
//!
//! impl Middleware for Timing {
//!     fn name(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut RequestContext,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Response> {
//!         Box::pin(async move {
//!             let response = next.run(ctx, request).await;
//!             tracing::debug!(elapsed = ?ctx.elapsed(), "stage complete");
//!             response
//!         })
//!     }
//! }
//! ```

use crate::context::RequestContext;
use crate::types::{Request, Response};
use std::future::Future;
use std::pin::Pin;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A pipeline stage.
pub trait Middleware: Send + Sync + 'static {
    /// Stable stage name for logs and pipeline introspection.
    fn name(&self) -> &'static str;

    /// Processes the request, usually by running `next` and post-processing
    /// its response.
    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response>;
}

/// The terminal of a pipeline.
pub trait Handler: Send + Sync {
    /// Produces the response.
    fn call<'a>(&'a self, ctx: &'a mut RequestContext, request: Request) -> BoxFuture<'a, Response>;
}

/// The remainder of a pipeline.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    Handler(&'a dyn Handler),
}

impl<'a> Next<'a> {
    pub(crate) fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// A continuation that calls `handler` directly.
    pub fn handler(handler: &'a dyn Handler) -> Self {
        Self {
            inner: NextInner::Handler(handler),
        }
    }

    /// Runs the next stage, or the handler at the end of the chain.
    pub async fn run(self, ctx: &mut RequestContext, request: Request) -> Response {
        match self.inner {
            NextInner::Chain { middleware, next } => middleware.process(ctx, request, *next).await,
            NextInner::Handler(handler) => handler.call(ctx, request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{create_test_request, StatusHandler};
    use http::StatusCode;

    struct Tag(&'static str);

    impl Middleware for Tag {
        fn name(&self) -> &'static str {
            self.0
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut RequestContext,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                let mut response = next.run(ctx, request).await;
                response
                    .headers_mut()
                    .append("x-visited", http::HeaderValue::from_static(self.0));
                response
            })
        }
    }

    #[tokio::test]
    async fn test_next_handler() {
        let handler = StatusHandler(StatusCode::OK);
        let mut ctx = RequestContext::new();
        let response = Next::handler(&handler)
            .run(&mut ctx, create_test_request("GET", "/"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_chain_unwinds_in_reverse() {
        let first = Tag("first");
        let second = Tag("second");
        let handler = StatusHandler(StatusCode::ACCEPTED);

        let next = Next::new(&first, Next::new(&second, Next::handler(&handler)));
        let mut ctx = RequestContext::new();
        let response = next.run(&mut ctx, create_test_request("GET", "/")).await;

        let visited: Vec<_> = response
            .headers()
            .get_all("x-visited")
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(visited, vec!["second", "first"]);
    }
}
