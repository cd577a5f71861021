//! Operation status and result endpoints.

use super::{guarded, resource_id, store_failure, ResourceView};
use crate::frontend::Frontend;
use crate::operations::{location_url, operation_is_visible};
use http::header::LOCATION;
use http::StatusCode;
use meridian_core::{CloudError, OperationDocument, OperationRequest, ProvisioningState};
use meridian_middleware::stages::SUBSCRIPTION_ID_PARAM;
use meridian_middleware::{Request, RequestContext, Response, ResponseExt};

impl Frontend {
    /// Loads the operation named by the path, hiding it unless the caller
    /// may see it.
    async fn visible_operation(&self, ctx: &RequestContext, request: &Request) -> Result<OperationDocument, CloudError> {
        let operation_id = resource_id(ctx)?;
        let subscription_id = ctx.path_param(SUBSCRIPTION_ID_PARAM).unwrap_or_default();

        let operation = match guarded(ctx, self.store().get_operation(subscription_id, operation_id.name())).await? {
            Ok(operation) => operation,
            Err(err) if err.is_not_found() => return Err(CloudError::resource_not_found(operation_id)),
            Err(err) => return Err(store_failure(&err, "read operation")),
        };

        if operation_is_visible(request, subscription_id, &operation) {
            Ok(operation)
        } else {
            Err(CloudError::resource_not_found(operation_id))
        }
    }

    /// `GET .../hcpOperationStatuses/{name}`.
    pub(crate) async fn operation_status(&self, ctx: &RequestContext, request: &Request) -> Result<Response, CloudError> {
        let operation = self.visible_operation(ctx, request).await?;
        Ok(Response::json(StatusCode::OK, &operation.to_status()))
    }

    /// `GET .../hcpOperationResults/{name}`.
    ///
    /// Pending operations answer `202` with `Location` pointing back here.
    /// Successful ones answer with what the original request would have
    /// returned synchronously.
    pub(crate) async fn operation_result(&self, ctx: &RequestContext, request: &Request) -> Result<Response, CloudError> {
        let operation = self.visible_operation(ctx, request).await?;

        match operation.status {
            ProvisioningState::Failed | ProvisioningState::Canceled => {
                tracing::info!(operation = %operation.name, status = %operation.status, "operation did not succeed");
                return Err(CloudError::internal_server_error());
            }
            ProvisioningState::Succeeded => {}
            _ => {
                let mut response = Response::empty(StatusCode::ACCEPTED);
                if let Some(location) = operation
                    .operation_id
                    .as_ref()
                    .and_then(|id| location_url(request, id))
                {
                    response.headers_mut().insert(LOCATION, location);
                }
                return Ok(response);
            }
        }

        match operation.request {
            OperationRequest::Create | OperationRequest::Update => {
                let doc = match guarded(ctx, self.store().get_resource(&operation.external_id)).await? {
                    Ok(doc) => doc,
                    Err(err) if err.is_not_found() => {
                        return Err(CloudError::resource_not_found(&operation.external_id));
                    }
                    Err(err) => return Err(store_failure(&err, "read resource")),
                };
                let status = if operation.request == OperationRequest::Create {
                    StatusCode::CREATED
                } else {
                    StatusCode::OK
                };
                Ok(Response::json(status, &ResourceView::from(&doc)))
            }
            OperationRequest::RequestCredential => {
                let credential = guarded(ctx, self.cluster_service().get_admin_credential(&operation.internal_id))
                    .await?
                    .map_err(|err| err.into_cloud_error(&operation.external_id))?;
                Ok(Response::json(StatusCode::OK, &credential))
            }
            OperationRequest::Delete | OperationRequest::RevokeCredentials => {
                Ok(Response::empty(StatusCode::NO_CONTENT))
            }
        }
    }
}
