//! Resource bookkeeping documents.

use crate::operation::ProvisioningState;
use crate::resource_id::ResourceId;
use crate::system_data::SystemData;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stored record of a cluster, node pool or external auth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDocument {
    /// The public resource ID.
    pub resource_id: ResourceId,
    /// The orchestration-side identifier.
    pub internal_id: String,
    /// Name of the operation currently acting on the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_operation_id: Option<String>,
    /// Current provisioning state.
    pub provisioning_state: ProvisioningState,
    /// Azure region, for tracked resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// User tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// ARM creation and modification metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_data: Option<SystemData>,
    /// Last accepted resource properties.
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl ResourceDocument {
    /// A new document in the `Accepted` state.
    pub fn new(resource_id: ResourceId, internal_id: impl Into<String>) -> Self {
        Self {
            resource_id,
            internal_id: internal_id.into(),
            active_operation_id: None,
            provisioning_state: ProvisioningState::Accepted,
            location: None,
            tags: BTreeMap::new(),
            system_data: None,
            properties: serde_json::Value::Null,
        }
    }

    /// Points the document at a new operation and mirrors its status.
    pub fn begin_operation(&mut self, operation_name: &str, state: ProvisioningState) {
        self.active_operation_id = Some(operation_name.to_string());
        self.provisioning_state = state;
    }
}
