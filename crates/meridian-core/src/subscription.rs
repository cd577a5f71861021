//! Subscription registration documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a subscription as reported by ARM.
///
/// Unknown strings are preserved in [`SubscriptionState::Unrecognized`] so a
/// stored document with an unexpected state can still be read and reported.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SubscriptionState {
    /// Fully usable.
    Registered,
    /// Not registered with the provider.
    Unregistered,
    /// Usable for reads and deletes only.
    Warned,
    /// Usable for reads and deletes only.
    Suspended,
    /// Gone; all resources are torn down.
    Deleted,
    /// A state string this frontend does not understand.
    Unrecognized(String),
}

impl SubscriptionState {
    /// The wire form.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Registered => "Registered",
            Self::Unregistered => "Unregistered",
            Self::Warned => "Warned",
            Self::Suspended => "Suspended",
            Self::Deleted => "Deleted",
            Self::Unrecognized(other) => other,
        }
    }
}

impl From<String> for SubscriptionState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Registered" => Self::Registered,
            "Unregistered" => Self::Unregistered,
            "Warned" => Self::Warned,
            "Suspended" => Self::Suspended,
            "Deleted" => Self::Deleted,
            _ => Self::Unrecognized(value),
        }
    }
}

impl From<SubscriptionState> for String {
    fn from(state: SubscriptionState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A feature flag registered on a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    /// Feature name, `Namespace/Name`.
    pub name: String,
    /// Registration state of the feature.
    pub state: String,
}

/// Subscription properties supplied by ARM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionProperties {
    /// Owning tenant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Placement identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_placement_id: Option<String>,
    /// Quota identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota_id: Option<String>,
    /// Features registered on the subscription.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_features: Option<Vec<Feature>>,
}

/// The subscription document stored per subscription ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Lifecycle state.
    pub state: SubscriptionState,
    /// When ARM registered the subscription.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_date: Option<String>,
    /// Extra properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<SubscriptionProperties>,
    /// When this frontend last saw the document change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Subscription {
    /// A bare subscription document in `state`.
    pub fn new(state: SubscriptionState) -> Self {
        Self {
            state,
            registration_date: None,
            properties: None,
            last_updated: None,
        }
    }

    /// Field names whose values differ between two documents.
    pub fn changed_fields(&self, other: &Subscription) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.state != other.state {
            changed.push("state");
        }
        if self.registration_date != other.registration_date {
            changed.push("registrationDate");
        }
        if self.properties != other.properties {
            changed.push("properties");
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trips_unknown_values() {
        let state: SubscriptionState = serde_json::from_str("\"Frozen\"").unwrap();
        assert_eq!(state, SubscriptionState::Unrecognized("Frozen".into()));
        assert_eq!(serde_json::to_string(&state).unwrap(), "\"Frozen\"");
    }

    #[test]
    fn test_document_parse() {
        let sub: Subscription = serde_json::from_str(
            r#"{"state":"Registered","registrationDate":"2025-01-01","properties":{"tenantId":"t1"}}"#,
        )
        .unwrap();
        assert_eq!(sub.state, SubscriptionState::Registered);
        assert_eq!(
            sub.properties.and_then(|p| p.tenant_id).as_deref(),
            Some("t1")
        );
    }

    #[test]
    fn test_missing_state_is_rejected() {
        assert!(serde_json::from_str::<Subscription>(r#"{"registrationDate":"x"}"#).is_err());
    }

    #[test]
    fn test_changed_fields() {
        let a = Subscription::new(SubscriptionState::Registered);
        let mut b = a.clone();
        b.state = SubscriptionState::Warned;
        assert_eq!(a.changed_fields(&b), vec!["state"]);
        assert!(a.changed_fields(&a).is_empty());
    }
}
