//! ARM deployment preflight.
//!
//! Preflight is best effort: only resources of this provider with a known
//! API version and no template expressions are checked, and malformed
//! entries are skipped rather than reported. The query `api-version` is the
//! caller's deployments version and is not checked against the registry.

use crate::frontend::Frontend;
use http::StatusCode;
use meridian_core::api::{cluster_resource_type, external_auth_resource_type, node_pool_resource_type};
use meridian_core::validate::validate_resource_id;
use meridian_core::{CloudError, CloudErrorBody, CloudErrorCode, ResourceId, ResourceType};
use meridian_middleware::stages::{RESOURCE_GROUP_PARAM, SUBSCRIPTION_ID_PARAM};
use meridian_middleware::{RequestContext, Response, ResponseExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct PreflightRequest {
    #[serde(default)]
    resources: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreflightResource {
    name: String,
    #[serde(rename = "type")]
    resource_type: String,
    api_version: String,
    #[serde(default)]
    properties: Option<Value>,
}

#[derive(Debug, Serialize)]
struct PreflightResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<CloudErrorBody>,
}

/// Whether `value` contains an ARM template language expression anywhere.
fn contains_template_expression(value: &Value) -> bool {
    match value {
        Value::String(s) => s.starts_with('[') && s.ends_with(']') && !s.starts_with("[["),
        Value::Array(items) => items.iter().any(contains_template_expression),
        Value::Object(map) => map.values().any(contains_template_expression),
        _ => false,
    }
}

/// The resource ID a template resource would be deployed to.
fn deployed_resource_id(
    subscription_id: &str,
    resource_group: &str,
    resource_type: &ResourceType,
    name: &str,
) -> Option<ResourceId> {
    let names: Vec<&str> = name.split('/').collect();
    if names.len() != resource_type.types().len() {
        return None;
    }

    let mut path = format!(
        "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/{}",
        resource_type.namespace()
    );
    for (type_name, name) in resource_type.types().iter().zip(names) {
        path.push('/');
        path.push_str(type_name);
        path.push('/');
        path.push_str(name);
    }
    ResourceId::parse(&path).ok()
}

fn is_provider_type(resource_type: &ResourceType) -> bool {
    *resource_type == cluster_resource_type()
        || *resource_type == node_pool_resource_type()
        || *resource_type == external_auth_resource_type()
}

fn validate_resource(resource_id: &ResourceId, resource: &PreflightResource) -> Result<(), CloudError> {
    let mut details = Vec::new();
    if let Err(err) = validate_resource_id(resource_id) {
        details.push(err.body().clone());
    }
    if resource.properties.as_ref().is_some_and(|p| !p.is_object()) {
        details.push(
            CloudErrorBody::new(CloudErrorCode::InvalidRequestContent, "properties must be an object")
                .with_target("properties"),
        );
    }
    if details.is_empty() {
        Ok(())
    } else {
        Err(CloudError::from_details(details))
    }
}

impl Frontend {
    /// `POST .../deployments/{name}/preflight`.
    pub(crate) async fn deployment_preflight(&self, ctx: &RequestContext) -> Result<Response, CloudError> {
        let param = |name: &'static str| {
            ctx.path_param(name)
                .ok_or_else(|| CloudError::invalid_parameter_missing(name))
        };
        let subscription_id = param(SUBSCRIPTION_ID_PARAM)?;
        let resource_group = param(RESOURCE_GROUP_PARAM)?;

        let raw = ctx.body().map(|bytes| bytes.as_ref()).unwrap_or_default();
        let preflight: PreflightRequest =
            serde_json::from_slice(raw).map_err(CloudError::invalid_request_content)?;

        let mut failures = Vec::new();
        for (index, raw) in preflight.resources.into_iter().enumerate() {
            if contains_template_expression(&raw) {
                continue;
            }
            let resource: PreflightResource = match serde_json::from_value(raw) {
                Ok(resource) => resource,
                Err(err) => {
                    tracing::warn!(resource = index + 1, error = %err, "skipping malformed preflight resource");
                    continue;
                }
            };
            if !self.api_registry().is_supported(&resource.api_version) {
                tracing::warn!(
                    resource = index + 1,
                    api_version = %resource.api_version,
                    "skipping preflight resource with unrecognized API version"
                );
                continue;
            }
            let Ok(resource_type) = ResourceType::parse(&resource.resource_type) else {
                continue;
            };
            if !is_provider_type(&resource_type) {
                continue;
            }
            let Some(target) = deployed_resource_id(subscription_id, resource_group, &resource_type, &resource.name)
            else {
                tracing::warn!(resource = index + 1, name = %resource.name, "skipping preflight resource with mismatched name");
                continue;
            };

            if let Err(err) = validate_resource(&target, &resource) {
                let body = err.body();
                let details = if body.details.is_empty() {
                    vec![body.clone()]
                } else {
                    body.details.clone()
                };
                failures.push(CloudErrorBody {
                    code: body.code.clone(),
                    message: format!("Content validation failed for '{}'", resource.name),
                    target: Some(target.to_string()),
                    details,
                });
            }
        }

        Ok(Response::json(StatusCode::OK, &preflight_response(failures)))
    }
}

fn preflight_response(mut failures: Vec<CloudErrorBody>) -> PreflightResponse {
    let error = match failures.len() {
        0 => None,
        1 => failures.pop(),
        _ => Some(
            CloudErrorBody::new(
                CloudErrorCode::MultipleErrorsOccurred,
                "Content validation failed for multiple resources",
            )
            .with_details(failures),
        ),
    };
    PreflightResponse {
        status: if error.is_some() { "Failed" } else { "Succeeded" },
        error,
    }
}
