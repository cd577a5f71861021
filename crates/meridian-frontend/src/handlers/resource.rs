//! Cluster, node pool and external auth endpoints.

use super::{guarded, resource_id, store_failure};
use crate::error::ClusterServiceError;
use crate::frontend::Frontend;
use http::{HeaderMap, StatusCode};
use meridian_core::{
    CloudError, CloudErrorBody, CloudErrorCode, OperationDocument, OperationRequest, ProvisioningState,
    ResourceDocument, ResourceId, SystemData,
};
use meridian_middleware::{Request, RequestContext, Response, ResponseExt};
use meridian_store::Transaction;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The public representation of a resource document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceView {
    /// Resource ID as the caller spelled it at creation.
    pub id: String,
    /// Resource name.
    pub name: String,
    /// Fully qualified resource type.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Azure region, for tracked resources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// User tags.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// ARM creation and modification metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_data: Option<SystemData>,
    /// Resource properties including `provisioningState`.
    pub properties: Value,
}

impl From<&ResourceDocument> for ResourceView {
    fn from(doc: &ResourceDocument) -> Self {
        let mut properties = match &doc.properties {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        properties.insert(
            "provisioningState".to_string(),
            Value::String(doc.provisioning_state.as_str().to_string()),
        );

        Self {
            id: doc.resource_id.to_string(),
            name: doc.resource_id.name().to_string(),
            resource_type: doc.resource_id.resource_type().to_string(),
            location: doc.location.clone(),
            tags: doc.tags.clone(),
            system_data: doc.system_data.clone(),
            properties: Value::Object(properties),
        }
    }
}

#[derive(Debug, Serialize)]
struct ResourceList {
    value: Vec<ResourceView>,
}

/// The writable part of a resource request body.
#[derive(Debug, Default, Deserialize)]
struct ResourceBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    tags: Option<BTreeMap<String, String>>,
    #[serde(default)]
    properties: Option<Value>,
}

impl ResourceBody {
    fn parse(ctx: &RequestContext, resource_id: &ResourceId) -> Result<Self, CloudError> {
        let raw = ctx.body().map(|bytes| bytes.as_ref()).unwrap_or_default();
        let body: Self = serde_json::from_slice(raw).map_err(CloudError::invalid_request_content)?;

        let mut details = Vec::new();
        if let Some(name) = &body.name {
            if !name.eq_ignore_ascii_case(resource_id.name()) {
                details.push(
                    CloudErrorBody::new(
                        CloudErrorCode::InvalidRequestContent,
                        format!("name must match resourceID path: {resource_id}"),
                    )
                    .with_target("name"),
                );
            }
        }
        if body.properties.as_ref().is_some_and(|p| !p.is_object()) {
            details.push(
                CloudErrorBody::new(CloudErrorCode::InvalidRequestContent, "properties must be an object")
                    .with_target("properties"),
            );
        }

        if details.is_empty() {
            Ok(body)
        } else {
            Err(CloudError::from_details(details))
        }
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Applies a JSON merge patch: `null` removes a member, objects merge
/// recursively, anything else replaces.
fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = empty_object();
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                merge_patch(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

fn with_headers(mut response: Response, headers: HeaderMap) -> Response {
    response.headers_mut().extend(headers);
    response
}

fn is_nested(resource_id: &ResourceId) -> bool {
    resource_id.resource_type().types().len() > 1
}

impl Frontend {
    /// Refuses a mutation that conflicts with the resource's or its parent's
    /// provisioning state. Returns the parent document of a nested resource.
    pub(crate) async fn check_conflict(
        &self,
        ctx: &RequestContext,
        request: OperationRequest,
        resource_id: &ResourceId,
        current: Option<ProvisioningState>,
    ) -> Result<Option<ResourceDocument>, CloudError> {
        if let Some(state) = current {
            let lower = state.as_str().to_ascii_lowercase();
            match request {
                OperationRequest::Create => {}
                OperationRequest::Delete => {
                    if state == ProvisioningState::Deleting {
                        return Err(CloudError::conflict(resource_id, "Resource is already deleting"));
                    }
                }
                OperationRequest::Update
                | OperationRequest::RequestCredential
                | OperationRequest::RevokeCredentials => {
                    if !state.is_terminal() {
                        return Err(CloudError::conflict(
                            resource_id,
                            format!("Cannot {} resource while resource is {lower}", request.verb()),
                        ));
                    }
                }
            }
        }

        if !is_nested(resource_id) {
            return Ok(None);
        }
        let Some(parent_id) = resource_id.parent() else {
            return Ok(None);
        };

        let parent = match guarded(ctx, self.store().get_resource(parent_id)).await? {
            Ok(parent) => parent,
            Err(err) if err.is_not_found() => return Err(CloudError::resource_not_found(parent_id)),
            Err(err) => return Err(store_failure(&err, "read parent resource")),
        };
        if matches!(
            parent.provisioning_state,
            ProvisioningState::Provisioning | ProvisioningState::Deleting
        ) {
            return Err(CloudError::conflict(
                resource_id,
                format!(
                    "Cannot {} resource while parent resource is {}",
                    request.verb(),
                    parent.provisioning_state.as_str().to_ascii_lowercase()
                ),
            ));
        }
        Ok(Some(parent))
    }

    pub(crate) async fn commit(&self, ctx: &RequestContext, transaction: Transaction) -> Result<(), CloudError> {
        guarded(ctx, self.store().commit(transaction))
            .await?
            .map_err(|err| store_failure(&err, "commit transaction"))
    }

    async fn read_document(
        &self,
        ctx: &RequestContext,
        resource_id: &ResourceId,
    ) -> Result<Option<ResourceDocument>, CloudError> {
        match guarded(ctx, self.store().get_resource(resource_id)).await? {
            Ok(doc) => Ok(Some(doc)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(store_failure(&err, "read resource")),
        }
    }

    /// `GET` on a resource collection.
    pub(crate) async fn list_resources(&self, ctx: &RequestContext) -> Result<Response, CloudError> {
        let collection = resource_id(ctx)?;
        let scope = collection.parent().ok_or_else(CloudError::not_found)?;

        if !scope.is_subscription() && !scope.is_resource_group() && self.read_document(ctx, scope).await?.is_none() {
            return Err(CloudError::resource_not_found(scope));
        }

        let docs = guarded(ctx, self.store().list_resources(scope, collection.resource_type()))
            .await?
            .map_err(|err| store_failure(&err, "list resources"))?;
        let list = ResourceList {
            value: docs.iter().map(ResourceView::from).collect(),
        };
        Ok(Response::json(StatusCode::OK, &list))
    }

    /// `GET` on a resource.
    pub(crate) async fn read_resource(&self, ctx: &RequestContext) -> Result<Response, CloudError> {
        let resource_id = resource_id(ctx)?;
        let doc = self
            .read_document(ctx, resource_id)
            .await?
            .ok_or_else(|| CloudError::resource_not_found(resource_id))?;
        Ok(Response::json(StatusCode::OK, &ResourceView::from(&doc)))
    }

    /// `PUT` on a resource: creates it, or replaces an existing one.
    pub(crate) async fn create_or_update_resource(
        &self,
        ctx: &RequestContext,
        request: &Request,
    ) -> Result<Response, CloudError> {
        let resource_id = resource_id(ctx)?;
        let body = ResourceBody::parse(ctx, resource_id)?;

        match self.read_document(ctx, resource_id).await? {
            Some(doc) => self.update_resource(ctx, request, doc, body, false).await,
            None => self.create_resource(ctx, request, resource_id, body).await,
        }
    }

    /// `PATCH` on a resource.
    pub(crate) async fn patch_resource(&self, ctx: &RequestContext, request: &Request) -> Result<Response, CloudError> {
        let resource_id = resource_id(ctx)?;
        let body = ResourceBody::parse(ctx, resource_id)?;

        let doc = self
            .read_document(ctx, resource_id)
            .await?
            .ok_or_else(|| CloudError::resource_not_found(resource_id))?;
        self.update_resource(ctx, request, doc, body, true).await
    }

    async fn create_resource(
        &self,
        ctx: &RequestContext,
        request: &Request,
        resource_id: &ResourceId,
        body: ResourceBody,
    ) -> Result<Response, CloudError> {
        let parent = self
            .check_conflict(ctx, OperationRequest::Create, resource_id, None)
            .await?;
        let properties = body.properties.unwrap_or_else(empty_object);

        let parent_internal_id = parent.as_ref().map(|doc| doc.internal_id.as_str());
        let internal_id = guarded(
            ctx,
            self.cluster_service().create(resource_id, parent_internal_id, &properties),
        )
        .await?
        .map_err(|err| err.into_cloud_error(resource_id))?;

        let operation = OperationDocument::new(
            OperationRequest::Create,
            resource_id.clone(),
            internal_id.clone(),
            ctx.correlation(),
        );
        let mut doc = ResourceDocument::new(resource_id.clone(), internal_id);
        if parent.is_none() {
            doc.location = Some(self.location().to_string());
        }
        doc.tags = body.tags.unwrap_or_default();
        doc.system_data = ctx.system_data().cloned();
        doc.properties = properties;
        doc.begin_operation(&operation.name, ProvisioningState::Accepted);
        let view = ResourceView::from(&doc);

        let mut transaction = Transaction::new(resource_id.subscription_id());
        transaction.create_operation(operation.clone()).create_resource(doc);
        self.commit(ctx, transaction).await?;
        tracing::info!(resource_id = %resource_id, operation = %operation.name, "created resource");

        let headers = self.expose_operation(request, &operation).await?;
        Ok(with_headers(Response::json(StatusCode::CREATED, &view), headers))
    }

    async fn update_resource(
        &self,
        ctx: &RequestContext,
        request: &Request,
        mut doc: ResourceDocument,
        body: ResourceBody,
        merge: bool,
    ) -> Result<Response, CloudError> {
        let resource_id = doc.resource_id.clone();
        self.check_conflict(ctx, OperationRequest::Update, &resource_id, Some(doc.provisioning_state))
            .await?;
        guarded(ctx, self.cancel_active_operation(&doc)).await??;

        let properties = if merge {
            let mut merged = doc.properties.clone();
            if let Some(patch) = &body.properties {
                merge_patch(&mut merged, patch);
            }
            merged
        } else {
            body.properties.unwrap_or_else(empty_object)
        };

        guarded(ctx, self.cluster_service().update(&doc.internal_id, &properties))
            .await?
            .map_err(|err| err.into_cloud_error(&resource_id))?;

        let operation = OperationDocument::new(
            OperationRequest::Update,
            resource_id.clone(),
            doc.internal_id.clone(),
            ctx.correlation(),
        );
        doc.properties = properties;
        match body.tags {
            Some(tags) => doc.tags = tags,
            None if !merge => doc.tags.clear(),
            None => {}
        }
        if let Some(newer) = ctx.system_data() {
            doc.system_data
                .get_or_insert_with(SystemData::default)
                .merge_modification(newer);
        }
        doc.begin_operation(&operation.name, ProvisioningState::Accepted);
        let view = ResourceView::from(&doc);

        let mut transaction = Transaction::new(resource_id.subscription_id());
        transaction.create_operation(operation.clone()).replace_resource(doc);
        self.commit(ctx, transaction).await?;
        tracing::info!(resource_id = %resource_id, operation = %operation.name, "updated resource");

        let headers = self.expose_operation(request, &operation).await?;
        let status = if merge { StatusCode::ACCEPTED } else { StatusCode::OK };
        Ok(with_headers(Response::json(status, &view), headers))
    }

    /// `DELETE` on a resource. Deleting what does not exist succeeds with
    /// `204`.
    pub(crate) async fn delete_resource(&self, ctx: &RequestContext, request: &Request) -> Result<Response, CloudError> {
        let resource_id = resource_id(ctx)?;
        let Some(doc) = self.read_document(ctx, resource_id).await? else {
            return Ok(Response::empty(StatusCode::NO_CONTENT));
        };
        self.check_conflict(ctx, OperationRequest::Delete, resource_id, Some(doc.provisioning_state))
            .await?;

        let mut transaction = Transaction::new(resource_id.subscription_id());
        let operation = self.begin_delete(ctx, doc, &mut transaction).await?;
        self.commit(ctx, transaction).await?;

        let Some(operation) = operation else {
            tracing::info!(resource_id = %resource_id, "resource already gone from cluster service");
            return Ok(Response::empty(StatusCode::NO_CONTENT));
        };
        tracing::info!(resource_id = %resource_id, operation = %operation.name, "deleting resource");
        let headers = self.expose_operation(request, &operation).await?;
        Ok(with_headers(Response::empty(StatusCode::ACCEPTED), headers))
    }

    /// Starts deleting `doc` and records the bookkeeping in `transaction`.
    ///
    /// If the cluster service no longer knows the object the document is
    /// dropped and no operation is started.
    pub(crate) async fn begin_delete(
        &self,
        ctx: &RequestContext,
        mut doc: ResourceDocument,
        transaction: &mut Transaction,
    ) -> Result<Option<OperationDocument>, CloudError> {
        guarded(ctx, self.cancel_active_operation(&doc)).await??;

        match guarded(ctx, self.cluster_service().delete(&doc.internal_id)).await? {
            Ok(()) => {}
            Err(ClusterServiceError::NotFound(_)) => {
                transaction.delete_resource(doc.resource_id);
                return Ok(None);
            }
            Err(err) => return Err(err.into_cloud_error(&doc.resource_id)),
        }

        let operation = OperationDocument::new(
            OperationRequest::Delete,
            doc.resource_id.clone(),
            doc.internal_id.clone(),
            ctx.correlation(),
        );
        doc.begin_operation(&operation.name, ProvisioningState::Deleting);
        transaction.create_operation(operation.clone()).replace_resource(doc);
        Ok(Some(operation))
    }

    /// The cluster an action path points at.
    async fn action_target(&self, ctx: &RequestContext) -> Result<ResourceDocument, CloudError> {
        let action_id = resource_id(ctx)?;
        let cluster_id = action_id.parent().ok_or_else(CloudError::not_found)?;
        self.read_document(ctx, cluster_id)
            .await?
            .ok_or_else(|| CloudError::resource_not_found(cluster_id))
    }

    async fn start_action(
        &self,
        ctx: &RequestContext,
        request: &Request,
        operation: OperationDocument,
    ) -> Result<Response, CloudError> {
        let mut transaction = Transaction::new(operation.external_id.subscription_id());
        transaction.create_operation(operation.clone());
        self.commit(ctx, transaction).await?;
        tracing::info!(
            resource_id = %operation.external_id,
            operation = %operation.name,
            request = %operation.request,
            "started action"
        );

        let headers = self.expose_operation(request, &operation).await?;
        Ok(with_headers(Response::empty(StatusCode::ACCEPTED), headers))
    }

    /// `POST .../requestadmincredential`.
    pub(crate) async fn request_admin_credential(
        &self,
        ctx: &RequestContext,
        request: &Request,
    ) -> Result<Response, CloudError> {
        let cluster = self.action_target(ctx).await?;
        self.check_conflict(
            ctx,
            OperationRequest::RequestCredential,
            &cluster.resource_id,
            Some(cluster.provisioning_state),
        )
        .await?;

        let credential_id = guarded(ctx, self.cluster_service().request_admin_credential(&cluster.internal_id))
            .await?
            .map_err(|err| err.into_cloud_error(&cluster.resource_id))?;

        let operation = OperationDocument::new(
            OperationRequest::RequestCredential,
            cluster.resource_id,
            credential_id,
            ctx.correlation(),
        );
        self.start_action(ctx, request, operation).await
    }

    /// `POST .../revokecredentials`. Pending credential requests for the
    /// cluster are canceled.
    pub(crate) async fn revoke_credentials(&self, ctx: &RequestContext, request: &Request) -> Result<Response, CloudError> {
        let cluster = self.action_target(ctx).await?;
        self.check_conflict(
            ctx,
            OperationRequest::RevokeCredentials,
            &cluster.resource_id,
            Some(cluster.provisioning_state),
        )
        .await?;

        guarded(ctx, self.cluster_service().revoke_credentials(&cluster.internal_id))
            .await?
            .map_err(|err| err.into_cloud_error(&cluster.resource_id))?;
        self.cancel_credential_requests(ctx, &cluster.resource_id).await?;

        let operation = OperationDocument::new(
            OperationRequest::RevokeCredentials,
            cluster.resource_id,
            cluster.internal_id,
            ctx.correlation(),
        );
        self.start_action(ctx, request, operation).await
    }

    async fn cancel_credential_requests(&self, ctx: &RequestContext, cluster_id: &ResourceId) -> Result<(), CloudError> {
        let subscription_id = cluster_id.subscription_id();
        let operations = guarded(ctx, self.store().list_operations(subscription_id))
            .await?
            .map_err(|err| store_failure(&err, "list operations"))?;

        let pending = operations.into_iter().filter(|op| {
            op.request == OperationRequest::RequestCredential
                && op.external_id == *cluster_id
                && !op.status.is_terminal()
        });
        for operation in pending {
            guarded(
                ctx,
                self.store()
                    .update_operation(subscription_id, &operation.name, &mut OperationDocument::cancel),
            )
            .await?
            .map_err(|err| store_failure(&err, "cancel credential request"))?;
            tracing::info!(operation = %operation.name, "canceled credential request");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CLUSTER: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/dev";

    fn ctx_with_body(body: &str) -> RequestContext {
        RequestContext::new().with_body(bytes::Bytes::from(body.to_string()))
    }

    #[test]
    fn test_merge_patch() {
        let mut target = json!({"version": {"id": "4.15"}, "dns": {"baseDomain": "a"}, "keep": 1});
        merge_patch(&mut target, &json!({"version": {"id": "4.16"}, "dns": null}));
        assert_eq!(target, json!({"version": {"id": "4.16"}, "keep": 1}));

        let mut scalar = json!("x");
        merge_patch(&mut scalar, &json!({"a": 1}));
        assert_eq!(scalar, json!({"a": 1}));
    }

    #[test]
    fn test_view_includes_provisioning_state() {
        let id = ResourceId::parse(CLUSTER).unwrap();
        let mut doc = ResourceDocument::new(id, "internal");
        doc.properties = json!({"version": {"id": "4.16"}});
        doc.location = Some("eastus".to_string());

        let view = serde_json::to_value(ResourceView::from(&doc)).unwrap();
        assert_eq!(view["name"], "dev");
        assert_eq!(view["type"], "Microsoft.RedHatOpenShift/hcpOpenShiftClusters");
        assert_eq!(view["properties"]["provisioningState"], "Accepted");
        assert_eq!(view["properties"]["version"]["id"], "4.16");
        assert!(view.get("tags").is_none());
    }

    #[test]
    fn test_body_name_must_match_path() {
        let id = ResourceId::parse(CLUSTER).unwrap();
        assert!(ResourceBody::parse(&ctx_with_body(r#"{"name":"DEV"}"#), &id).is_ok());

        let err = ResourceBody::parse(&ctx_with_body(r#"{"name":"other"}"#), &id).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.body().target.as_deref(), Some("name"));
    }

    #[test]
    fn test_body_errors_are_collected() {
        let id = ResourceId::parse(CLUSTER).unwrap();
        let err = ResourceBody::parse(&ctx_with_body(r#"{"name":"other","properties":[]}"#), &id).unwrap_err();
        assert_eq!(err.body().code, CloudErrorCode::MultipleErrorsOccurred.as_str());
        assert_eq!(err.body().details.len(), 2);

        let err = ResourceBody::parse(&ctx_with_body("{"), &id).unwrap_err();
        assert_eq!(err.body().code, CloudErrorCode::InvalidRequestContent.as_str());
    }
}
