//! In-memory store and lock table.
//!
//! Used by tests and local development. State lives behind a single
//! `parking_lot::Mutex`, which makes every transaction trivially atomic.
//! Nothing survives a restart and separate processes do not share state.

use crate::document::{DocumentStore, OperationUpdate};
use crate::error::{StoreError, StoreResult};
use crate::lock::{LockClient, LockHandle};
use crate::transaction::{Transaction, TransactionStep};
use async_trait::async_trait;
use meridian_core::{OperationDocument, ResourceDocument, ResourceId, ResourceType, Subscription};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Documents {
    subscriptions: HashMap<String, Subscription>,
    /// Keyed by lowercased resource ID; ordered so listings are stable.
    resources: BTreeMap<String, ResourceDocument>,
    /// Keyed by `(subscription, operation name)`, both lowercased.
    operations: HashMap<(String, String), OperationDocument>,
}

/// In-memory [`DocumentStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Documents>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn operation_key(subscription_id: &str, operation_name: &str) -> (String, String) {
    (
        subscription_id.to_ascii_lowercase(),
        operation_name.to_ascii_lowercase(),
    )
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_subscription(&self, subscription_id: &str) -> StoreResult<Subscription> {
        self.inner
            .lock()
            .subscriptions
            .get(&subscription_id.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("subscription {subscription_id}")))
    }

    async fn put_subscription(&self, subscription_id: &str, subscription: Subscription) -> StoreResult<()> {
        self.inner
            .lock()
            .subscriptions
            .insert(subscription_id.to_ascii_lowercase(), subscription);
        Ok(())
    }

    async fn get_resource(&self, resource_id: &ResourceId) -> StoreResult<ResourceDocument> {
        self.inner
            .lock()
            .resources
            .get(&resource_id.key())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(resource_id.to_string()))
    }

    async fn list_resources(
        &self,
        scope: &ResourceId,
        resource_type: &ResourceType,
    ) -> StoreResult<Vec<ResourceDocument>> {
        let prefix = format!("{}/", scope.key());
        Ok(self
            .inner
            .lock()
            .resources
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter(|(_, doc)| doc.resource_id.resource_type() == resource_type)
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn get_operation(&self, subscription_id: &str, operation_name: &str) -> StoreResult<OperationDocument> {
        self.inner
            .lock()
            .operations
            .get(&operation_key(subscription_id, operation_name))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("operation {operation_name}")))
    }

    async fn list_operations(&self, subscription_id: &str) -> StoreResult<Vec<OperationDocument>> {
        let partition = subscription_id.to_ascii_lowercase();
        let mut docs: Vec<OperationDocument> = self
            .inner
            .lock()
            .operations
            .iter()
            .filter(|((sub, _), _)| *sub == partition)
            .map(|(_, doc)| doc.clone())
            .collect();
        docs.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        Ok(docs)
    }

    async fn update_operation(
        &self,
        subscription_id: &str,
        operation_name: &str,
        update: OperationUpdate<'_>,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.lock();
        let doc = inner
            .operations
            .get_mut(&operation_key(subscription_id, operation_name))
            .ok_or_else(|| StoreError::NotFound(format!("operation {operation_name}")))?;

        let mut candidate = doc.clone();
        if update(&mut candidate) {
            *doc = candidate;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn commit(&self, transaction: Transaction) -> StoreResult<()> {
        let partition = transaction.partition_key().to_string();
        let mut inner = self.inner.lock();

        for step in transaction.steps() {
            match step {
                TransactionStep::CreateResource(doc) => {
                    check_partition(&partition, doc.resource_id.subscription_id())?;
                    if inner.resources.contains_key(&doc.resource_id.key()) {
                        return Err(StoreError::Conflict(doc.resource_id.to_string()));
                    }
                }
                TransactionStep::ReplaceResource(doc) => {
                    check_partition(&partition, doc.resource_id.subscription_id())?;
                    if !inner.resources.contains_key(&doc.resource_id.key()) {
                        return Err(StoreError::NotFound(doc.resource_id.to_string()));
                    }
                }
                TransactionStep::DeleteResource(id) => {
                    check_partition(&partition, id.subscription_id())?;
                }
                TransactionStep::CreateOperation(doc) => {
                    check_partition(&partition, doc.external_id.subscription_id())?;
                    if inner
                        .operations
                        .contains_key(&operation_key(&partition, &doc.name))
                    {
                        return Err(StoreError::Conflict(format!("operation {}", doc.name)));
                    }
                }
            }
        }

        for step in transaction.into_steps() {
            match step {
                TransactionStep::CreateResource(doc) | TransactionStep::ReplaceResource(doc) => {
                    inner.resources.insert(doc.resource_id.key(), doc);
                }
                TransactionStep::DeleteResource(id) => {
                    inner.resources.remove(&id.key());
                }
                TransactionStep::CreateOperation(doc) => {
                    inner
                        .operations
                        .insert(operation_key(&partition, &doc.name), doc);
                }
            }
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

fn check_partition(partition: &str, subscription_id: &str) -> StoreResult<()> {
    if partition.eq_ignore_ascii_case(subscription_id) {
        Ok(())
    } else {
        Err(StoreError::Unexpected(anyhow::anyhow!(
            "document for subscription {subscription_id} does not belong to partition {partition}"
        )))
    }
}

#[derive(Debug, Clone)]
struct Lease {
    owner: Uuid,
    etag: u64,
    expires_at: Instant,
}

/// In-memory [`LockClient`].
#[derive(Debug)]
pub struct MemoryLockClient {
    ttl: Duration,
    retry_interval: Duration,
    leases: Mutex<HashMap<String, Lease>>,
    next_etag: Mutex<u64>,
}

impl MemoryLockClient {
    /// Creates a lock table with the given lease duration and retry delay.
    pub fn new(ttl: Duration, retry_interval: Duration) -> Self {
        Self {
            ttl,
            retry_interval,
            leases: Mutex::new(HashMap::new()),
            next_etag: Mutex::new(0),
        }
    }

    /// Whether a live lease exists for `subscription_id`.
    pub fn is_locked(&self, subscription_id: &str) -> bool {
        self.leases
            .lock()
            .get(&subscription_id.to_ascii_lowercase())
            .is_some_and(|lease| lease.expires_at > Instant::now())
    }

    fn etag(&self) -> u64 {
        let mut next = self.next_etag.lock();
        *next += 1;
        *next
    }
}

impl Default for MemoryLockClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(1))
    }
}

#[async_trait]
impl LockClient for MemoryLockClient {
    fn default_ttl(&self) -> Duration {
        self.ttl
    }

    fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    async fn try_acquire(&self, subscription_id: &str) -> StoreResult<Option<LockHandle>> {
        let key = subscription_id.to_ascii_lowercase();
        let now = Instant::now();
        let etag = self.etag();
        let mut leases = self.leases.lock();

        if leases.get(&key).is_some_and(|lease| lease.expires_at > now) {
            return Ok(None);
        }

        let owner = Uuid::now_v7();
        leases.insert(
            key,
            Lease {
                owner,
                etag,
                expires_at: now + self.ttl,
            },
        );
        Ok(Some(LockHandle::new(subscription_id, owner, etag.to_string(), self.ttl)))
    }

    async fn renew(&self, handle: &LockHandle) -> StoreResult<Option<LockHandle>> {
        let key = handle.subscription_id().to_ascii_lowercase();
        let now = Instant::now();
        let etag = self.etag();
        let mut leases = self.leases.lock();

        let Some(lease) = leases.get_mut(&key) else {
            return Ok(None);
        };
        if lease.owner != handle.owner() || lease.etag.to_string() != handle.etag() || lease.expires_at <= now {
            return Ok(None);
        }

        lease.etag = etag;
        lease.expires_at = now + self.ttl;
        Ok(Some(LockHandle::new(
            handle.subscription_id(),
            handle.owner(),
            etag.to_string(),
            self.ttl,
        )))
    }

    async fn release(&self, handle: LockHandle) -> StoreResult<()> {
        let key = handle.subscription_id().to_ascii_lowercase();
        let mut leases = self.leases.lock();
        if leases.get(&key).is_some_and(|lease| lease.owner == handle.owner()) {
            leases.remove(&key);
        } else {
            tracing::debug!(subscription_id = %handle.subscription_id(), "lock already released or taken over");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::{api, OperationRequest, ProvisioningState, SubscriptionState};

    const SUB: &str = "00000000-0000-0000-0000-000000000000";

    fn cluster(name: &str) -> ResourceId {
        ResourceId::parse(&format!(
            "/subscriptions/{SUB}/resourceGroups/rg/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/{name}"
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_subscription_round_trip_is_case_insensitive() {
        let store = MemoryStore::new();
        store
            .put_subscription(&SUB.to_uppercase(), Subscription::new(SubscriptionState::Warned))
            .await
            .unwrap();
        assert_eq!(
            store.get_subscription(SUB).await.unwrap().state,
            SubscriptionState::Warned
        );
        assert!(store.get_subscription("other").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing() {
        let store = MemoryStore::new();
        let id = cluster("dev");

        let mut tx = Transaction::new(SUB);
        tx.create_resource(ResourceDocument::new(id.clone(), "/api/1"));
        store.commit(tx).await.unwrap();

        let op = OperationDocument::new(OperationRequest::Create, id.clone(), "", None);
        let op_name = op.name.clone();
        let mut tx = Transaction::new(SUB);
        tx.create_operation(op)
            .create_resource(ResourceDocument::new(id.clone(), "/api/2"));
        let err = store.commit(tx).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        assert!(store.get_operation(SUB, &op_name).await.unwrap_err().is_not_found());
        assert_eq!(store.get_resource(&id).await.unwrap().internal_id, "/api/1");
    }

    #[tokio::test]
    async fn test_replace_requires_existing() {
        let store = MemoryStore::new();
        let mut tx = Transaction::new(SUB);
        tx.replace_resource(ResourceDocument::new(cluster("dev"), ""));
        assert!(store.commit(tx).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_resources_by_scope_and_type() {
        let store = MemoryStore::new();
        let mut tx = Transaction::new(SUB);
        tx.create_resource(ResourceDocument::new(cluster("one"), ""))
            .create_resource(ResourceDocument::new(cluster("two"), ""))
            .create_resource(ResourceDocument::new(
                ResourceId::parse(&format!("{}/nodePools/np1", cluster("one"))).unwrap(),
                "",
            ));
        store.commit(tx).await.unwrap();

        let sub = ResourceId::parse(&format!("/subscriptions/{SUB}")).unwrap();
        let clusters = store
            .list_resources(&sub, &api::cluster_resource_type())
            .await
            .unwrap();
        assert_eq!(clusters.len(), 2);

        let pools = store
            .list_resources(&cluster("one"), &api::node_pool_resource_type())
            .await
            .unwrap();
        assert_eq!(pools.len(), 1);
        assert!(store
            .list_resources(&cluster("two"), &api::node_pool_resource_type())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_update_operation() {
        let store = MemoryStore::new();
        let op = OperationDocument::new(OperationRequest::Update, cluster("dev"), "", None);
        let name = op.name.clone();
        let mut tx = Transaction::new(SUB);
        tx.create_operation(op);
        store.commit(tx).await.unwrap();

        let changed = store
            .update_operation(SUB, &name, &mut |doc: &mut OperationDocument| {
                doc.update_status(ProvisioningState::Succeeded, None)
            })
            .await
            .unwrap();
        assert!(changed);
        let unchanged = store
            .update_operation(SUB, &name, &mut |_: &mut OperationDocument| false)
            .await
            .unwrap();
        assert!(!unchanged);
        assert_eq!(
            store.get_operation(SUB, &name).await.unwrap().status,
            ProvisioningState::Succeeded
        );

        let missing = store
            .update_operation(SUB, "nope", &mut |_: &mut OperationDocument| true)
            .await;
        assert!(missing.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_partition_mismatch_rejected() {
        let store = MemoryStore::new();
        let mut tx = Transaction::new("11111111-1111-1111-1111-111111111111");
        tx.create_resource(ResourceDocument::new(cluster("dev"), ""));
        assert!(matches!(store.commit(tx).await, Err(StoreError::Unexpected(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_exclusive_until_expiry() {
        let locks = MemoryLockClient::new(Duration::from_secs(10), Duration::from_secs(1));
        let first = locks.try_acquire(SUB).await.unwrap().unwrap();
        assert!(locks.try_acquire(SUB).await.unwrap().is_none());
        assert!(locks.is_locked(&SUB.to_uppercase()));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(!locks.is_locked(SUB));
        assert!(locks.renew(&first).await.unwrap().is_none());
        assert!(locks.try_acquire(SUB).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_renew_rotates_etag() {
        let locks = MemoryLockClient::default();
        let handle = locks.try_acquire(SUB).await.unwrap().unwrap();
        tokio::time::advance(Duration::from_secs(9)).await;

        let renewed = locks.renew(&handle).await.unwrap().unwrap();
        assert_ne!(renewed.etag(), handle.etag());
        assert!(locks.renew(&handle).await.unwrap().is_none(), "stale etag");

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(locks.is_locked(SUB));
    }

    #[tokio::test]
    async fn test_release_ignores_foreign_owner() {
        let locks = MemoryLockClient::default();
        let handle = locks.try_acquire(SUB).await.unwrap().unwrap();
        let stranger = LockHandle::new(SUB, Uuid::nil(), "0", Duration::from_secs(10));

        locks.release(stranger).await.unwrap();
        assert!(locks.is_locked(SUB));
        locks.release(handle).await.unwrap();
        assert!(!locks.is_locked(SUB));
    }
}
