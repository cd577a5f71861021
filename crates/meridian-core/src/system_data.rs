//! ARM system metadata attached to resources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of principal that created or modified a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreatedByType {
    /// An application principal.
    Application,
    /// A key-based caller.
    Key,
    /// A managed identity.
    ManagedIdentity,
    /// A user.
    User,
}

/// Creation and modification metadata supplied by ARM in
/// `x-ms-arm-resource-system-data`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemData {
    /// Who created the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// What kind of principal created the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_type: Option<CreatedByType>,
    /// When the resource was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Who last modified the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<String>,
    /// What kind of principal last modified the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_by_type: Option<CreatedByType>,
    /// When the resource was last modified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_at: Option<DateTime<Utc>>,
}

impl SystemData {
    /// Folds a newer modification into existing metadata, keeping creation fields.
    pub fn merge_modification(&mut self, newer: &SystemData) {
        if self.created_by.is_none() {
            self.created_by = newer.created_by.clone();
            self.created_by_type = newer.created_by_type;
            self.created_at = newer.created_at;
        }
        if newer.last_modified_by.is_some() {
            self.last_modified_by = newer.last_modified_by.clone();
            self.last_modified_by_type = newer.last_modified_by_type;
            self.last_modified_at = newer.last_modified_at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header_payload() {
        let data: SystemData = serde_json::from_str(
            r#"{"createdBy":"alice@example.com","createdByType":"User","createdAt":"2025-01-02T03:04:05Z"}"#,
        )
        .unwrap();
        assert_eq!(data.created_by.as_deref(), Some("alice@example.com"));
        assert_eq!(data.created_by_type, Some(CreatedByType::User));
        assert!(data.last_modified_by.is_none());
    }

    #[test]
    fn test_merge_keeps_creation() {
        let mut existing = SystemData {
            created_by: Some("alice".into()),
            created_by_type: Some(CreatedByType::User),
            ..SystemData::default()
        };
        let newer = SystemData {
            created_by: Some("bob".into()),
            last_modified_by: Some("bob".into()),
            last_modified_by_type: Some(CreatedByType::Application),
            ..SystemData::default()
        };
        existing.merge_modification(&newer);
        assert_eq!(existing.created_by.as_deref(), Some("alice"));
        assert_eq!(existing.last_modified_by.as_deref(), Some("bob"));
    }
}
