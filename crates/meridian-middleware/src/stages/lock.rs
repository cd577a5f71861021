//! Per-subscription mutation lock.
//!
//! Mutating requests hold the subscription's lock for the whole handler run.
//! Renewal runs alongside the handler inside the same request future, so it
//! stops when the request does. Losing the lease cancels the token handed to
//! the handler through the context.

use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::stages::logging::SUBSCRIPTION_ID_PARAM;
use crate::types::{Request, Response, ResponseExt};
use futures_util::FutureExt;
use http::header::RETRY_AFTER;
use http::{HeaderValue, Method};
use meridian_core::CloudError;
use meridian_store::{acquire_lock, hold_lock, LockClient};
use meridian_telemetry::record_lock_acquisition;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Serializes mutations per subscription through a [`LockClient`].
///
/// `GET` and `HEAD` pass through without locking. Acquisition waits up to
/// the lock TTL; on timeout the caller gets `409 Conflict` with
/// `Retry-After` set to the TTL in seconds.
#[derive(Clone)]
pub struct LockMiddleware {
    client: Arc<dyn LockClient>,
}

impl LockMiddleware {
    /// Creates the stage around `client`.
    pub fn new(client: Arc<dyn LockClient>) -> Self {
        Self { client }
    }

    fn busy(retry_after_secs: u64) -> Response {
        let mut response = Response::cloud_error(&CloudError::subscription_busy());
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        response
    }
}

impl std::fmt::Debug for LockMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockMiddleware")
            .field("ttl", &self.client.default_ttl())
            .finish_non_exhaustive()
    }
}

impl Middleware for LockMiddleware {
    fn name(&self) -> &'static str {
        "lock"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            if matches!(*request.method(), Method::GET | Method::HEAD) {
                return next.run(ctx, request).await;
            }

            let Some(subscription_id) = ctx.path_param(SUBSCRIPTION_ID_PARAM).map(str::to_string)
            else {
                return Response::cloud_error(&CloudError::invalid_parameter_missing(
                    SUBSCRIPTION_ID_PARAM,
                ));
            };

            let client = self.client.as_ref();
            let ttl = client.default_ttl();
            let handle = match acquire_lock(client, &subscription_id, ttl).await {
                Ok(handle) => {
                    record_lock_acquisition("acquired");
                    handle
                }
                Err(err) if err.is_timeout() => {
                    record_lock_acquisition("timeout");
                    tracing::warn!(%subscription_id, error = %err, "subscription lock busy");
                    return Self::busy(ttl.as_secs());
                }
                Err(err) => {
                    record_lock_acquisition("error");
                    tracing::error!(%subscription_id, error = %err, "failed to acquire subscription lock");
                    return Response::cloud_error(&CloudError::internal_server_error());
                }
            };
            tracing::debug!(%subscription_id, "acquired subscription lock");

            let lost = CancellationToken::new();
            ctx.set_cancellation(lost.clone());
            let stop = CancellationToken::new();

            let handler = async {
                let outcome = AssertUnwindSafe(next.run(ctx, request)).catch_unwind().await;
                stop.cancel();
                outcome
            };
            let (outcome, handle) = tokio::join!(handler, hold_lock(client, handle, &stop, &lost));

            if let Err(err) = client.release(handle).await {
                tracing::error!(%subscription_id, error = %err, "failed to release subscription lock");
            }

            match outcome {
                Ok(response) => response,
                Err(payload) => std::panic::resume_unwind(payload),
            }
        })
    }
}
