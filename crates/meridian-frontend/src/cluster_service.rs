//! The orchestration backend the frontend delegates mutations to.
//!
//! The frontend only records bookkeeping; the cluster service owns the
//! actual clusters, node pools, external auths and break-glass credentials.
//! Each object it creates is identified by an opaque internal ID stored on
//! the resource and operation documents.

use crate::error::ClusterServiceError;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use meridian_core::api::{external_auth_resource_type, node_pool_resource_type, OPENSHIFT_VERSION_PREFIX};
use meridian_core::ResourceId;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// Result type alias using [`ClusterServiceError`].
pub type ClusterServiceResult<T> = Result<T, ClusterServiceError>;

/// An OpenShift release the cluster service can install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenShiftVersion {
    /// Cluster service ID, e.g. `openshift-v4.16.3`.
    pub id: String,
    /// Release channel group, e.g. `stable`.
    pub channel_group: String,
    /// Whether new clusters may use it.
    pub enabled: bool,
    /// When support ends, if announced.
    pub end_of_life: Option<DateTime<Utc>>,
}

impl OpenShiftVersion {
    /// Creates an enabled version without an end-of-life date.
    pub fn new(id: impl Into<String>, channel_group: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            channel_group: channel_group.into(),
            enabled: true,
            end_of_life: None,
        }
    }

    /// The public name: the ID without the `openshift-v` prefix.
    pub fn name(&self) -> &str {
        self.id.strip_prefix(OPENSHIFT_VERSION_PREFIX).unwrap_or(&self.id)
    }
}

/// Client for the cluster service.
#[async_trait]
pub trait ClusterService: Send + Sync {
    /// Creates the object behind `resource_id`. Nested resources pass their
    /// parent cluster's internal ID. Returns the new internal ID.
    async fn create(
        &self,
        resource_id: &ResourceId,
        parent_internal_id: Option<&str>,
        properties: &Value,
    ) -> ClusterServiceResult<String>;

    /// Replaces the desired state of an existing object.
    async fn update(&self, internal_id: &str, properties: &Value) -> ClusterServiceResult<()>;

    /// Starts deleting an object and everything below it.
    async fn delete(&self, internal_id: &str) -> ClusterServiceResult<()>;

    /// Issues a break-glass credential for a cluster. Returns the
    /// credential's internal ID.
    async fn request_admin_credential(&self, cluster_internal_id: &str) -> ClusterServiceResult<String>;

    /// Reads an issued credential.
    async fn get_admin_credential(&self, credential_internal_id: &str) -> ClusterServiceResult<Value>;

    /// Revokes every credential issued for a cluster.
    async fn revoke_credentials(&self, cluster_internal_id: &str) -> ClusterServiceResult<()>;

    /// Every OpenShift version on offer.
    async fn list_versions(&self) -> ClusterServiceResult<Vec<OpenShiftVersion>>;

    /// One version, by public name or full ID.
    async fn get_version(&self, name: &str) -> ClusterServiceResult<OpenShiftVersion>;
}

const CLUSTERS_PATH: &str = "/api/aro_hcp/v1alpha1/clusters";
const CREDENTIAL_LIFETIME_HOURS: i64 = 24;

#[derive(Debug, Clone)]
struct Credential {
    cluster: String,
    expires_at: chrono::DateTime<Utc>,
}

/// In-memory cluster service for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryClusterService {
    objects: Mutex<HashMap<String, Value>>,
    credentials: Mutex<HashMap<String, Credential>>,
    versions: Mutex<Vec<OpenShiftVersion>>,
    unavailable: AtomicBool,
}

impl MemoryClusterService {
    /// Creates an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with [`ClusterServiceError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// The stored desired state of an object.
    pub fn object(&self, internal_id: &str) -> Option<Value> {
        self.objects.lock().get(internal_id).cloned()
    }

    /// Offers `version` to callers.
    pub fn add_version(&self, version: OpenShiftVersion) {
        self.versions.lock().push(version);
    }

    /// Number of live objects.
    pub fn object_count(&self) -> usize {
        self.objects.lock().len()
    }

    fn check_available(&self) -> ClusterServiceResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClusterServiceError::Unavailable(
                "cluster service is not reachable".to_string(),
            ));
        }
        Ok(())
    }

    fn require_object(&self, internal_id: &str) -> ClusterServiceResult<()> {
        if self.objects.lock().contains_key(internal_id) {
            Ok(())
        } else {
            Err(ClusterServiceError::NotFound(internal_id.to_string()))
        }
    }
}

#[async_trait]
impl ClusterService for MemoryClusterService {
    async fn create(
        &self,
        resource_id: &ResourceId,
        parent_internal_id: Option<&str>,
        properties: &Value,
    ) -> ClusterServiceResult<String> {
        self.check_available()?;

        let resource_type = resource_id.resource_type();
        let internal_id = if *resource_type == node_pool_resource_type()
            || *resource_type == external_auth_resource_type()
        {
            let parent = parent_internal_id.ok_or_else(|| {
                ClusterServiceError::InvalidRequest(format!(
                    "{resource_type} requires a parent cluster"
                ))
            })?;
            self.require_object(parent)?;
            let collection = if *resource_type == node_pool_resource_type() {
                "node_pools"
            } else {
                "external_auths"
            };
            format!("{parent}/{collection}/{}", Uuid::new_v4().simple())
        } else {
            format!("{CLUSTERS_PATH}/{}", Uuid::new_v4().simple())
        };

        self.objects.lock().insert(internal_id.clone(), properties.clone());
        tracing::debug!(%internal_id, resource_id = %resource_id, "created cluster service object");
        Ok(internal_id)
    }

    async fn update(&self, internal_id: &str, properties: &Value) -> ClusterServiceResult<()> {
        self.check_available()?;
        match self.objects.lock().get_mut(internal_id) {
            Some(existing) => {
                *existing = properties.clone();
                Ok(())
            }
            None => Err(ClusterServiceError::NotFound(internal_id.to_string())),
        }
    }

    async fn delete(&self, internal_id: &str) -> ClusterServiceResult<()> {
        self.check_available()?;
        let mut objects = self.objects.lock();
        if objects.remove(internal_id).is_none() {
            return Err(ClusterServiceError::NotFound(internal_id.to_string()));
        }
        let prefix = format!("{internal_id}/");
        objects.retain(|id, _| !id.starts_with(&prefix));
        drop(objects);

        self.credentials.lock().retain(|_, credential| credential.cluster != internal_id);
        Ok(())
    }

    async fn request_admin_credential(&self, cluster_internal_id: &str) -> ClusterServiceResult<String> {
        self.check_available()?;
        self.require_object(cluster_internal_id)?;

        let credential_id = format!(
            "{cluster_internal_id}/break_glass_credentials/{}",
            Uuid::new_v4().simple()
        );
        self.credentials.lock().insert(
            credential_id.clone(),
            Credential {
                cluster: cluster_internal_id.to_string(),
                expires_at: Utc::now() + ChronoDuration::hours(CREDENTIAL_LIFETIME_HOURS),
            },
        );
        Ok(credential_id)
    }

    async fn get_admin_credential(&self, credential_internal_id: &str) -> ClusterServiceResult<Value> {
        self.check_available()?;
        let credentials = self.credentials.lock();
        let credential = credentials
            .get(credential_internal_id)
            .ok_or_else(|| ClusterServiceError::NotFound(credential_internal_id.to_string()))?;

        Ok(json!({
            "kubeconfig": format!("# break-glass kubeconfig for {}", credential.cluster),
            "expirationTimestamp": credential.expires_at,
        }))
    }

    async fn revoke_credentials(&self, cluster_internal_id: &str) -> ClusterServiceResult<()> {
        self.check_available()?;
        self.require_object(cluster_internal_id)?;
        self.credentials
            .lock()
            .retain(|_, credential| credential.cluster != cluster_internal_id);
        Ok(())
    }

    async fn list_versions(&self) -> ClusterServiceResult<Vec<OpenShiftVersion>> {
        self.check_available()?;
        Ok(self.versions.lock().clone())
    }

    async fn get_version(&self, name: &str) -> ClusterServiceResult<OpenShiftVersion> {
        self.check_available()?;
        let id = if name.starts_with(OPENSHIFT_VERSION_PREFIX) {
            name.to_string()
        } else {
            format!("{OPENSHIFT_VERSION_PREFIX}{name}")
        };
        self.versions
            .lock()
            .iter()
            .find(|version| version.id.eq_ignore_ascii_case(&id))
            .cloned()
            .ok_or(ClusterServiceError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLUSTER: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/dev";

    fn id(path: &str) -> ResourceId {
        ResourceId::parse(path).unwrap()
    }

    #[tokio::test]
    async fn test_nested_objects_removed_with_cluster() {
        let service = MemoryClusterService::new();
        let cluster = service.create(&id(CLUSTER), None, &json!({})).await.unwrap();
        let pool = service
            .create(&id(&format!("{CLUSTER}/nodePools/np1")), Some(&cluster), &json!({"replicas": 2}))
            .await
            .unwrap();

        assert!(pool.starts_with(&cluster));
        assert_eq!(service.object_count(), 2);

        service.delete(&cluster).await.unwrap();
        assert_eq!(service.object_count(), 0);
        assert!(matches!(service.delete(&cluster).await, Err(ClusterServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_node_pool_requires_parent() {
        let service = MemoryClusterService::new();
        let result = service
            .create(&id(&format!("{CLUSTER}/nodePools/np1")), None, &json!({}))
            .await;
        assert!(matches!(result, Err(ClusterServiceError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_credentials_lifecycle() {
        let service = MemoryClusterService::new();
        let cluster = service.create(&id(CLUSTER), None, &json!({})).await.unwrap();

        let credential = service.request_admin_credential(&cluster).await.unwrap();
        let body = service.get_admin_credential(&credential).await.unwrap();
        assert!(body["kubeconfig"].as_str().unwrap().contains(&cluster));

        service.revoke_credentials(&cluster).await.unwrap();
        assert!(service.get_admin_credential(&credential).await.is_err());
    }

    #[tokio::test]
    async fn test_version_lookup_accepts_public_name() {
        let service = MemoryClusterService::new();
        service.add_version(OpenShiftVersion::new("openshift-v4.16.3", "stable"));

        let by_name = service.get_version("4.16.3").await.unwrap();
        assert_eq!(by_name.name(), "4.16.3");
        assert_eq!(service.get_version("openshift-v4.16.3").await.unwrap(), by_name);
        assert!(matches!(
            service.get_version("4.17.0").await,
            Err(ClusterServiceError::NotFound(_))
        ));
        assert_eq!(service.list_versions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let service = MemoryClusterService::new();
        service.set_unavailable(true);
        let result = service.create(&id(CLUSTER), None, &json!({})).await;
        assert!(matches!(result, Err(ClusterServiceError::Unavailable(_))));
    }
}
