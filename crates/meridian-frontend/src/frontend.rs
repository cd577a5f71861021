//! The [`Frontend`]: injected collaborators shared by every handler.

use crate::cluster_service::{ClusterService, MemoryClusterService};
use meridian_config::FrontendConfig;
use meridian_core::ApiRegistry;
use meridian_middleware::{AuditSink, TracingAuditSink};
use meridian_store::{DocumentStore, LockClient, MemoryLockClient, MemoryStore};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_LOCATION: &str = "eastus";

/// The resource-provider frontend.
///
/// Holds the document store, lock table, cluster service, audit sink and
/// API-version registry. Handlers are methods on this type; the
/// [`Router`](crate::Router) wires them to routes.
///
/// ```
/// use meridian_frontend::Frontend;
///
/// let frontend = Frontend::builder().location("westus3").build();
/// assert_eq!(frontend.location(), "westus3");
/// ```
pub struct Frontend {
    store: Arc<dyn DocumentStore>,
    locks: Arc<dyn LockClient>,
    cluster_service: Arc<dyn ClusterService>,
    audit: Option<Arc<dyn AuditSink>>,
    api_registry: ApiRegistry,
    location: String,
}

impl Frontend {
    /// Creates a builder with in-memory collaborators.
    #[must_use]
    pub fn builder() -> FrontendBuilder {
        FrontendBuilder::default()
    }

    /// Builds a frontend over in-memory collaborators sized by `config`.
    pub fn from_config(config: &FrontendConfig) -> Self {
        let locks = MemoryLockClient::new(config.lock.ttl(), config.lock.retry_interval());
        let mut builder = Self::builder()
            .locks(Arc::new(locks))
            .api_registry(ApiRegistry::new(config.api.versions.iter().cloned()))
            .location(config.server.location.clone());
        if config.audit.enabled {
            builder = builder.audit_sink(Arc::new(TracingAuditSink));
        }
        builder.build()
    }

    /// The document store.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// The subscription lock table.
    pub fn locks(&self) -> &Arc<dyn LockClient> {
        &self.locks
    }

    /// The orchestration backend.
    pub fn cluster_service(&self) -> &dyn ClusterService {
        self.cluster_service.as_ref()
    }

    /// The audit sink, if auditing is enabled.
    pub fn audit_sink(&self) -> Option<&Arc<dyn AuditSink>> {
        self.audit.as_ref()
    }

    /// Accepted API versions.
    pub fn api_registry(&self) -> &ApiRegistry {
        &self.api_registry
    }

    /// The Azure region this frontend serves.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// How long a client should wait before retrying a request that lost
    /// the subscription lock.
    pub fn retry_after(&self) -> Duration {
        self.locks.default_ttl()
    }
}

impl std::fmt::Debug for Frontend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frontend")
            .field("store", &self.store.backend_name())
            .field("location", &self.location)
            .field("audit", &self.audit.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Frontend`].
#[derive(Default)]
pub struct FrontendBuilder {
    store: Option<Arc<dyn DocumentStore>>,
    locks: Option<Arc<dyn LockClient>>,
    cluster_service: Option<Arc<dyn ClusterService>>,
    audit: Option<Arc<dyn AuditSink>>,
    api_registry: Option<ApiRegistry>,
    location: Option<String>,
}

impl FrontendBuilder {
    /// Sets the document store.
    pub fn store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the subscription lock table.
    pub fn locks(mut self, locks: Arc<dyn LockClient>) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Sets the orchestration backend.
    pub fn cluster_service(mut self, cluster_service: Arc<dyn ClusterService>) -> Self {
        self.cluster_service = Some(cluster_service);
        self
    }

    /// Enables auditing into `sink`.
    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Sets the accepted API versions.
    pub fn api_registry(mut self, registry: ApiRegistry) -> Self {
        self.api_registry = Some(registry);
        self
    }

    /// Sets the served region.
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Builds the frontend, filling gaps with in-memory defaults.
    #[must_use]
    pub fn build(self) -> Frontend {
        Frontend {
            store: self.store.unwrap_or_else(|| Arc::new(MemoryStore::new())),
            locks: self.locks.unwrap_or_else(|| Arc::new(MemoryLockClient::default())),
            cluster_service: self
                .cluster_service
                .unwrap_or_else(|| Arc::new(MemoryClusterService::new())),
            audit: self.audit,
            api_registry: self.api_registry.unwrap_or_default(),
            location: self.location.unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let frontend = Frontend::builder().build();
        assert_eq!(frontend.location(), DEFAULT_LOCATION);
        assert_eq!(frontend.store().backend_name(), "memory");
        assert!(frontend.audit_sink().is_none());
        assert_eq!(frontend.retry_after(), Duration::from_secs(10));
    }

    #[test]
    fn test_from_config() {
        let mut config = FrontendConfig::default();
        config.server.location = "westus3".to_string();
        config.lock.ttl_secs = 7;
        config.audit.enabled = true;
        config.api.versions = vec!["2025-01-01".to_string()];

        let frontend = Frontend::from_config(&config);
        assert_eq!(frontend.location(), "westus3");
        assert_eq!(frontend.retry_after(), Duration::from_secs(7));
        assert!(frontend.audit_sink().is_some());
        assert!(frontend.api_registry().is_supported("2025-01-01"));
        assert!(!frontend.api_registry().is_supported("2024-06-10-preview"));
    }
}
