//! Provider constants and the API-version registry.

use crate::resource_id::ResourceType;
use std::collections::BTreeSet;

/// The resource provider namespace served by this frontend.
pub const PROVIDER_NAMESPACE: &str = "Microsoft.RedHatOpenShift";

/// Cluster resource type name.
pub const CLUSTER_TYPE_NAME: &str = "hcpOpenShiftClusters";

/// Node pool resource type name, nested under clusters.
pub const NODE_POOL_TYPE_NAME: &str = "nodePools";

/// External auth resource type name, nested under clusters.
pub const EXTERNAL_AUTH_TYPE_NAME: &str = "externalAuths";

/// Operation status resource type name, nested under locations.
pub const OPERATION_STATUS_TYPE_NAME: &str = "hcpOperationStatuses";

/// Operation result resource type name, nested under locations.
pub const OPERATION_RESULT_TYPE_NAME: &str = "hcpOperationResults";

/// OpenShift version resource type name, nested under locations.
pub const VERSION_TYPE_NAME: &str = "hcpOpenShiftVersions";

/// Prefix the cluster service puts on version IDs; stripped in public names.
pub const OPENSHIFT_VERSION_PREFIX: &str = "openshift-v";

/// Location resource type name.
pub const LOCATIONS_TYPE_NAME: &str = "locations";

/// Deployment resource type name used by preflight.
pub const DEPLOYMENTS_TYPE_NAME: &str = "deployments";

/// Cluster action that issues a break-glass kubeconfig.
pub const REQUEST_ADMIN_CREDENTIAL_ACTION: &str = "requestadmincredential";

/// Cluster action that revokes every issued credential.
pub const REVOKE_CREDENTIALS_ACTION: &str = "revokecredentials";

/// Largest accepted request body.
pub const MAX_REQUEST_BODY_BYTES: usize = 4 * 1024 * 1024;

/// API versions served when none are configured.
pub const DEFAULT_API_VERSIONS: &[&str] = &["2024-06-10-preview"];

/// `Microsoft.RedHatOpenShift/hcpOpenShiftClusters`.
pub fn cluster_resource_type() -> ResourceType {
    ResourceType::new(PROVIDER_NAMESPACE, CLUSTER_TYPE_NAME)
}

/// `Microsoft.RedHatOpenShift/hcpOpenShiftClusters/nodePools`.
pub fn node_pool_resource_type() -> ResourceType {
    cluster_resource_type().append_child(NODE_POOL_TYPE_NAME)
}

/// `Microsoft.RedHatOpenShift/hcpOpenShiftClusters/externalAuths`.
pub fn external_auth_resource_type() -> ResourceType {
    cluster_resource_type().append_child(EXTERNAL_AUTH_TYPE_NAME)
}

/// `Microsoft.RedHatOpenShift/locations/hcpOperationStatuses`.
pub fn operation_status_resource_type() -> ResourceType {
    ResourceType::new(PROVIDER_NAMESPACE, LOCATIONS_TYPE_NAME).append_child(OPERATION_STATUS_TYPE_NAME)
}

/// `Microsoft.RedHatOpenShift/locations/hcpOperationResults`.
pub fn operation_result_resource_type() -> ResourceType {
    ResourceType::new(PROVIDER_NAMESPACE, LOCATIONS_TYPE_NAME).append_child(OPERATION_RESULT_TYPE_NAME)
}

/// `Microsoft.RedHatOpenShift/locations/hcpOpenShiftVersions`.
pub fn version_resource_type() -> ResourceType {
    ResourceType::new(PROVIDER_NAMESPACE, LOCATIONS_TYPE_NAME).append_child(VERSION_TYPE_NAME)
}

/// The set of API versions this frontend accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRegistry {
    versions: BTreeSet<String>,
}

impl ApiRegistry {
    /// Creates a registry from a list of versions.
    pub fn new<I, S>(versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            versions: versions.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `version` is registered.
    pub fn is_supported(&self, version: &str) -> bool {
        self.versions.contains(version)
    }

    /// Registered versions in ascending order.
    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.versions.iter().map(String::as_str)
    }
}

impl Default for ApiRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_API_VERSIONS.iter().copied())
    }
}
