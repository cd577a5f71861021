//! OpenShift version endpoints.
//!
//! Versions live in the cluster service, not the document store; these
//! endpoints only reshape what it reports into ARM resources scoped to the
//! requested location.

use super::{guarded, resource_id};
use crate::cluster_service::OpenShiftVersion;
use crate::frontend::Frontend;
use chrono::{DateTime, Utc};
use http::StatusCode;
use meridian_core::api::VERSION_TYPE_NAME;
use meridian_core::{CloudError, ResourceId};
use meridian_middleware::{RequestContext, Response, ResponseExt};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionProperties {
    channel_group: String,
    enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_of_life_timestamp: Option<DateTime<Utc>>,
}

/// The public representation of an [`OpenShiftVersion`].
#[derive(Debug, Serialize)]
struct VersionView {
    id: String,
    name: String,
    #[serde(rename = "type")]
    resource_type: String,
    properties: VersionProperties,
}

impl VersionView {
    fn new(resource_id: &ResourceId, version: OpenShiftVersion) -> Self {
        Self {
            id: resource_id.to_string(),
            name: resource_id.name().to_string(),
            resource_type: resource_id.resource_type().to_string(),
            properties: VersionProperties {
                channel_group: version.channel_group,
                enabled: version.enabled,
                end_of_life_timestamp: version.end_of_life,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct VersionList {
    value: Vec<VersionView>,
}

impl Frontend {
    /// `GET` on the versions collection of a location.
    pub(crate) async fn list_versions(&self, ctx: &RequestContext) -> Result<Response, CloudError> {
        let collection = resource_id(ctx)?;
        let location = collection.parent().ok_or_else(CloudError::not_found)?;

        let versions = guarded(ctx, self.cluster_service().list_versions())
            .await?
            .map_err(|err| err.into_cloud_error(collection))?;

        let mut value = Vec::with_capacity(versions.len());
        for version in versions {
            let id = ResourceId::parse(&format!("{location}/{VERSION_TYPE_NAME}/{}", version.name())).map_err(
                |err| {
                    tracing::error!(error = %err, version = %version.id, "failed to build version ID");
                    CloudError::internal_server_error()
                },
            )?;
            value.push(VersionView::new(&id, version));
        }
        Ok(Response::json(StatusCode::OK, &VersionList { value }))
    }

    /// `GET` on one version.
    pub(crate) async fn read_version(&self, ctx: &RequestContext) -> Result<Response, CloudError> {
        let resource_id = resource_id(ctx)?;
        let version = guarded(ctx, self.cluster_service().get_version(resource_id.name()))
            .await?
            .map_err(|err| err.into_cloud_error(resource_id))?;
        Ok(Response::json(StatusCode::OK, &VersionView::new(resource_id, version)))
    }
}
