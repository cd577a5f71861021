//! Endpoint handlers.
//!
//! Each endpoint is an async method on [`Frontend`] returning
//! `Result<Response, CloudError>`. [`EndpointHandler`] adapts one endpoint
//! to the pipeline's [`Handler`] seam and reports errors in one place.

mod operation;
mod preflight;
mod resource;
mod subscription;
mod version;

use crate::frontend::Frontend;
use http::header::RETRY_AFTER;
use http::HeaderValue;
use meridian_core::{CloudError, ResourceId};
use meridian_middleware::{BoxFuture, Handler, Request, RequestContext, Response, ResponseExt};
use meridian_store::StoreError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub use resource::ResourceView;

/// What a matched route does once its stages have run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Read a subscription document.
    SubscriptionGet,
    /// Create or replace a subscription document.
    SubscriptionPut,
    /// List resources of one type under a scope.
    ResourceList,
    /// Read one resource.
    ResourceRead,
    /// Create or replace a resource.
    ResourceCreateOrUpdate,
    /// Merge-patch a resource.
    ResourcePatch,
    /// Delete a resource.
    ResourceDelete,
    /// Issue a break-glass credential.
    RequestAdminCredential,
    /// Revoke every break-glass credential.
    RevokeCredentials,
    /// Poll an operation's status.
    OperationStatus,
    /// Fetch an operation's result.
    OperationResult,
    /// Validate a deployment template.
    DeploymentPreflight,
    /// List the OpenShift versions offered in a location.
    VersionList,
    /// Read one OpenShift version.
    VersionRead,
}

/// Runs one [`Endpoint`] against a [`Frontend`].
pub(crate) struct EndpointHandler<'f> {
    frontend: &'f Frontend,
    endpoint: Endpoint,
}

impl<'f> EndpointHandler<'f> {
    pub(crate) fn new(frontend: &'f Frontend, endpoint: Endpoint) -> Self {
        Self { frontend, endpoint }
    }
}

impl Handler for EndpointHandler<'_> {
    fn call<'a>(&'a self, ctx: &'a mut RequestContext, request: Request) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let frontend = self.frontend;
            let ctx: &RequestContext = ctx;
            let result = match self.endpoint {
                Endpoint::SubscriptionGet => frontend.get_subscription(ctx).await,
                Endpoint::SubscriptionPut => frontend.put_subscription(ctx).await,
                Endpoint::ResourceList => frontend.list_resources(ctx).await,
                Endpoint::ResourceRead => frontend.read_resource(ctx).await,
                Endpoint::ResourceCreateOrUpdate => frontend.create_or_update_resource(ctx, &request).await,
                Endpoint::ResourcePatch => frontend.patch_resource(ctx, &request).await,
                Endpoint::ResourceDelete => frontend.delete_resource(ctx, &request).await,
                Endpoint::RequestAdminCredential => frontend.request_admin_credential(ctx, &request).await,
                Endpoint::RevokeCredentials => frontend.revoke_credentials(ctx, &request).await,
                Endpoint::OperationStatus => frontend.operation_status(ctx, &request).await,
                Endpoint::OperationResult => frontend.operation_result(ctx, &request).await,
                Endpoint::DeploymentPreflight => frontend.deployment_preflight(ctx).await,
                Endpoint::VersionList => frontend.list_versions(ctx).await,
                Endpoint::VersionRead => frontend.read_version(ctx).await,
            };
            report(ctx, result, frontend.retry_after())
        })
    }
}

/// Renders a handler result, logging errors.
///
/// A request whose subscription lock was lost also gets `Retry-After`.
fn report(ctx: &RequestContext, result: Result<Response, CloudError>, retry_after: Duration) -> Response {
    let err = match result {
        Ok(response) => return response,
        Err(err) => err,
    };

    if err.status().is_server_error() {
        tracing::error!(status = %err.status(), error = %err, "request failed");
    } else {
        tracing::info!(status = %err.status(), code = %err.body().code, "request rejected");
    }

    let mut response = Response::cloud_error(&err);
    if ctx.cancellation().is_some_and(CancellationToken::is_cancelled) {
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(retry_after.as_secs()));
    }
    response
}

/// Races `future` against loss of the subscription lock.
pub(crate) async fn guarded<F: Future>(ctx: &RequestContext, future: F) -> Result<F::Output, CloudError> {
    let Some(token) = ctx.cancellation() else {
        return Ok(future.await);
    };
    token.run_until_cancelled(future).await.ok_or_else(|| {
        tracing::warn!("subscription lock lost, abandoning request");
        CloudError::subscription_busy()
    })
}

/// The resource ID recorded by the resource ID stage.
pub(crate) fn resource_id(ctx: &RequestContext) -> Result<&ResourceId, CloudError> {
    ctx.resource_id().ok_or_else(CloudError::not_found)
}

/// Logs an unexpected store failure and hides it behind a `500`.
pub(crate) fn store_failure(err: &StoreError, action: &'static str) -> CloudError {
    tracing::error!(error = %err, action, "document store failure");
    CloudError::internal_server_error()
}
