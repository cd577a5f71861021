//! Multi-document transactions scoped to one subscription.

use meridian_core::{OperationDocument, ResourceDocument, ResourceId};

/// A single write inside a [`Transaction`].
#[derive(Debug, Clone)]
pub enum TransactionStep {
    /// Insert a resource document; fails if it exists.
    CreateResource(ResourceDocument),
    /// Overwrite an existing resource document; fails if it is missing.
    ReplaceResource(ResourceDocument),
    /// Remove a resource document if present.
    DeleteResource(ResourceId),
    /// Insert an operation document; fails if it exists.
    CreateOperation(OperationDocument),
}

/// An all-or-nothing batch of writes within one subscription partition.
///
/// # Example
///
/// ```
/// use meridian_core::{OperationDocument, OperationRequest, ResourceDocument, ResourceId};
/// use meridian_store::Transaction;
///
/// let id = ResourceId::parse("/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/dev").unwrap();
/// let mut tx = Transaction::new(id.subscription_id());
/// tx.create_operation(OperationDocument::new(OperationRequest::Create, id.clone(), "", None))
///     .create_resource(ResourceDocument::new(id, ""));
/// assert_eq!(tx.steps().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Transaction {
    partition_key: String,
    steps: Vec<TransactionStep>,
}

impl Transaction {
    /// Starts an empty transaction for a subscription.
    pub fn new(subscription_id: &str) -> Self {
        Self {
            partition_key: subscription_id.to_ascii_lowercase(),
            steps: Vec::new(),
        }
    }

    /// The lowercased subscription ID the transaction is scoped to.
    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    /// Queues a resource insert.
    pub fn create_resource(&mut self, doc: ResourceDocument) -> &mut Self {
        self.steps.push(TransactionStep::CreateResource(doc));
        self
    }

    /// Queues a resource overwrite.
    pub fn replace_resource(&mut self, doc: ResourceDocument) -> &mut Self {
        self.steps.push(TransactionStep::ReplaceResource(doc));
        self
    }

    /// Queues a resource removal.
    pub fn delete_resource(&mut self, resource_id: ResourceId) -> &mut Self {
        self.steps.push(TransactionStep::DeleteResource(resource_id));
        self
    }

    /// Queues an operation insert.
    pub fn create_operation(&mut self, doc: OperationDocument) -> &mut Self {
        self.steps.push(TransactionStep::CreateOperation(doc));
        self
    }

    /// The queued steps, in order.
    pub fn steps(&self) -> &[TransactionStep] {
        &self.steps
    }

    /// Whether nothing has been queued.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Consumes the transaction, returning its steps.
    pub fn into_steps(self) -> Vec<TransactionStep> {
        self.steps
    }
}
