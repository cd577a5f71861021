//! Long-running operation bookkeeping.

use crate::correlation::CorrelationData;
use crate::error::{CloudErrorBody, CloudErrorCode};
use crate::resource_id::ResourceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Provisioning state of a resource, also used as operation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProvisioningState {
    /// Completed successfully.
    Succeeded,
    /// Completed with an error.
    Failed,
    /// Superseded or aborted.
    Canceled,
    /// Accepted, not yet started.
    Accepted,
    /// Being created.
    Provisioning,
    /// Being updated.
    Updating,
    /// Being deleted.
    Deleting,
}

impl ProvisioningState {
    /// Whether no further transitions are expected.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    /// The wire form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Canceled => "Canceled",
            Self::Accepted => "Accepted",
            Self::Provisioning => "Provisioning",
            Self::Updating => "Updating",
            Self::Deleting => "Deleting",
        }
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of mutation an operation tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationRequest {
    /// Resource creation.
    Create,
    /// Resource update.
    Update,
    /// Resource deletion.
    Delete,
    /// Break-glass credential issuance.
    RequestCredential,
    /// Credential revocation.
    RevokeCredentials,
}

impl OperationRequest {
    /// The wire form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::RequestCredential => "RequestCredential",
            Self::RevokeCredentials => "RevokeCredentials",
        }
    }

    /// Verb used in conflict messages.
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::RequestCredential => "request credential for",
            Self::RevokeCredentials => "revoke credentials for",
        }
    }
}

impl fmt::Display for OperationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored record of one long-running operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDocument {
    /// Operation name; the last segment of the public operation ID.
    pub name: String,
    /// What the operation does.
    pub request: OperationRequest,
    /// The resource the operation acts on.
    pub external_id: ResourceId,
    /// The orchestration-side identifier.
    pub internal_id: String,
    /// Public status resource ID. Unset until the operation is exposed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<ResourceId>,
    /// Completion notification target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_uri: Option<String>,
    /// Home tenant of the caller that started the operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Object ID of the caller that started the operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Caller-supplied request ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_request_id: Option<String>,
    /// Caller-supplied correlation ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_request_id: Option<String>,
    /// When the operation started.
    pub start_time: DateTime<Utc>,
    /// When the status last changed.
    pub last_transition_time: DateTime<Utc>,
    /// Current status.
    pub status: ProvisioningState,
    /// Failure detail for `Failed` and `Canceled`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CloudErrorBody>,
}

impl OperationDocument {
    /// Starts a new operation against `external_id`.
    pub fn new(
        request: OperationRequest,
        external_id: ResourceId,
        internal_id: impl Into<String>,
        correlation: Option<&CorrelationData>,
    ) -> Self {
        let now = Utc::now();
        let status = if request == OperationRequest::Delete {
            ProvisioningState::Deleting
        } else {
            ProvisioningState::Accepted
        };
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());

        Self {
            name: Uuid::now_v7().to_string(),
            request,
            external_id,
            internal_id: internal_id.into(),
            operation_id: None,
            notification_uri: None,
            tenant_id: None,
            client_id: None,
            client_request_id: correlation.and_then(|c| non_empty(&c.client_request_id)),
            correlation_request_id: correlation.and_then(|c| non_empty(&c.correlation_request_id)),
            start_time: now,
            last_transition_time: now,
            status,
            error: None,
        }
    }

    /// Moves the operation to `status`. Returns whether anything changed.
    pub fn update_status(&mut self, status: ProvisioningState, error: Option<CloudErrorBody>) -> bool {
        if self.status == status && self.error == error {
            return false;
        }
        self.status = status;
        self.error = error;
        self.last_transition_time = Utc::now();
        true
    }

    /// Marks the operation superseded by a newer one.
    pub fn cancel(&mut self) -> bool {
        self.update_status(
            ProvisioningState::Canceled,
            Some(CloudErrorBody::new(
                CloudErrorCode::Canceled,
                "This operation was superseded by another",
            )),
        )
    }

    /// The public status view.
    pub fn to_status(&self) -> OperationStatus {
        OperationStatus {
            id: self.operation_id.as_ref().map(ToString::to_string),
            name: self.name.clone(),
            status: self.status,
            start_time: self.start_time,
            end_time: self.status.is_terminal().then_some(self.last_transition_time),
            error: self.error.clone(),
        }
    }
}

/// Operation status as returned by the polling endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatus {
    /// Status resource ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Operation name.
    pub name: String,
    /// Current status.
    pub status: ProvisioningState,
    /// When the operation started.
    pub start_time: DateTime<Utc>,
    /// When the operation reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Failure detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CloudErrorBody>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_id() -> ResourceId {
        ResourceId::parse(
            "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/dev",
        )
        .unwrap()
    }

    #[test]
    fn test_terminal_states() {
        assert!(ProvisioningState::Succeeded.is_terminal());
        assert!(ProvisioningState::Canceled.is_terminal());
        assert!(!ProvisioningState::Deleting.is_terminal());
        assert!(!ProvisioningState::Accepted.is_terminal());
    }

    #[test]
    fn test_new_operation_initial_status() {
        let create = OperationDocument::new(OperationRequest::Create, cluster_id(), "/api/x", None);
        assert_eq!(create.status, ProvisioningState::Accepted);
        assert!(create.operation_id.is_none());

        let delete = OperationDocument::new(OperationRequest::Delete, cluster_id(), "/api/x", None);
        assert_eq!(delete.status, ProvisioningState::Deleting);
        assert_ne!(create.name, delete.name);
    }

    #[test]
    fn test_correlation_copied_when_present() {
        let correlation = CorrelationData {
            request_id: Uuid::nil(),
            client_request_id: "client".into(),
            correlation_request_id: String::new(),
        };
        let doc = OperationDocument::new(OperationRequest::Update, cluster_id(), "", Some(&correlation));
        assert_eq!(doc.client_request_id.as_deref(), Some("client"));
        assert!(doc.correlation_request_id.is_none());
    }

    #[test]
    fn test_cancel_and_status_view() {
        let mut doc = OperationDocument::new(OperationRequest::Update, cluster_id(), "", None);
        assert!(doc.to_status().end_time.is_none());

        assert!(doc.cancel());
        assert!(!doc.cancel());

        let view = doc.to_status();
        assert_eq!(view.status, ProvisioningState::Canceled);
        assert!(view.end_time.is_some());
        assert_eq!(view.error.map(|e| e.code), Some("Canceled".to_string()));
    }

    #[test]
    fn test_document_serializes_camel_case() {
        let doc = OperationDocument::new(OperationRequest::Create, cluster_id(), "/api/x", None);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["request"], "Create");
        assert_eq!(json["status"], "Accepted");
        assert!(json.get("externalId").is_some());
        assert!(json.get("operationId").is_none());
    }
}
