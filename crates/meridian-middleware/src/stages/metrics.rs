//! Request metrics.

use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use meridian_telemetry::{record_request, InFlightGuard};

const UNMATCHED_ROUTE: &str = "unmatched";

/// Counts requests and observes latency, labelled by matched route pattern.
///
/// The route label is read after the handler returns, so requests that never
/// reach the mux are labelled `unmatched` and path parameters never leak
/// into label cardinality.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsMiddleware;

impl MetricsMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for MetricsMiddleware {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let _in_flight = InFlightGuard::new();
            let method = request.method().clone();
            let started = std::time::Instant::now();

            let response = next.run(ctx, request).await;

            record_request(
                method.as_str(),
                ctx.route_pattern().unwrap_or(UNMATCHED_ROUTE),
                response.status().as_u16(),
                started.elapsed(),
            );
            response
        })
    }
}
