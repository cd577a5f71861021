//! The document store interface.

use crate::error::StoreResult;
use crate::transaction::Transaction;
use async_trait::async_trait;
use meridian_core::{OperationDocument, ResourceDocument, ResourceId, ResourceType, Subscription};

/// Mutation callback passed to [`DocumentStore::update_operation`].
///
/// Returns `true` if it changed the document and the change should be written.
pub type OperationUpdate<'a> = &'a mut (dyn FnMut(&mut OperationDocument) -> bool + Send);

/// Persistent storage for subscriptions, resources and operations.
///
/// All keys are compared case-insensitively.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads a subscription document.
    async fn get_subscription(&self, subscription_id: &str) -> StoreResult<Subscription>;

    /// Creates or overwrites a subscription document.
    async fn put_subscription(&self, subscription_id: &str, subscription: Subscription) -> StoreResult<()>;

    /// Reads a resource document.
    async fn get_resource(&self, resource_id: &ResourceId) -> StoreResult<ResourceDocument>;

    /// Lists resources of `resource_type` under `scope`.
    async fn list_resources(
        &self,
        scope: &ResourceId,
        resource_type: &ResourceType,
    ) -> StoreResult<Vec<ResourceDocument>>;

    /// Reads an operation document.
    async fn get_operation(&self, subscription_id: &str, operation_name: &str) -> StoreResult<OperationDocument>;

    /// Lists every operation document in a subscription.
    async fn list_operations(&self, subscription_id: &str) -> StoreResult<Vec<OperationDocument>>;

    /// Atomically reads, mutates and writes back an operation document.
    ///
    /// Returns whether `update` reported a change.
    async fn update_operation(
        &self,
        subscription_id: &str,
        operation_name: &str,
        update: OperationUpdate<'_>,
    ) -> StoreResult<bool>;

    /// Applies every step of `transaction` or none of them.
    async fn commit(&self, transaction: Transaction) -> StoreResult<()>;

    /// A short name for logs.
    fn backend_name(&self) -> &'static str;
}
