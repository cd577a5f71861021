//! Static naming rules for path segments.

use crate::api::{cluster_resource_type, external_auth_resource_type, node_pool_resource_type};
use crate::error::CloudError;
use crate::resource_id::{ResourceId, ResourceType};
use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

fn cluster_name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z][-a-zA-Z0-9]{2,53}$").ok()).as_ref()
}

fn node_pool_name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z][-a-zA-Z0-9]{2,14}$").ok()).as_ref()
}

fn external_auth_name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z][-a-zA-Z0-9]{2,14}$").ok()).as_ref()
}

fn resource_group_name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[-\w._()]{1,90}$").ok()).as_ref()
}

/// Whether `value` is a well-formed subscription ID.
pub fn is_valid_subscription_id(value: &str) -> bool {
    Uuid::parse_str(value).is_ok()
}

/// Whether `value` follows the ARM resource group naming rule.
pub fn is_valid_resource_group_name(value: &str) -> bool {
    resource_group_name_pattern().is_some_and(|p| p.is_match(value)) && !value.ends_with('.')
}

/// The naming rule for a resource type, if this provider defines one.
pub fn name_pattern(resource_type: &ResourceType) -> Option<&'static Regex> {
    if *resource_type == cluster_resource_type() {
        cluster_name_pattern()
    } else if *resource_type == node_pool_resource_type() {
        node_pool_name_pattern()
    } else if *resource_type == external_auth_resource_type() {
        external_auth_name_pattern()
    } else {
        None
    }
}

/// Checks every named segment of `resource_id`, outermost first.
pub fn validate_resource_id(resource_id: &ResourceId) -> Result<(), CloudError> {
    let mut chain: Vec<&ResourceId> = resource_id.ancestors().collect();
    chain.reverse();

    for segment in chain {
        if segment.is_subscription() {
            if !is_valid_subscription_id(segment.name()) {
                return Err(CloudError::invalid_subscription_id(segment.name()));
            }
        } else if segment.is_resource_group() {
            if !is_valid_resource_group_name(segment.name()) {
                return Err(CloudError::invalid_resource_group_name(segment.name()));
            }
        } else if !segment.name().is_empty() {
            if let Some(pattern) = name_pattern(segment.resource_type()) {
                if !pattern.is_match(segment.name()) {
                    return Err(CloudError::invalid_resource_name(
                        &segment.resource_type().to_string(),
                        segment.name(),
                        segment.resource_group_name(),
                    ));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUB: &str = "00000000-0000-0000-0000-000000000000";

    fn check(path: &str) -> Result<(), CloudError> {
        validate_resource_id(&ResourceId::parse(path).unwrap())
    }

    #[test]
    fn test_valid_paths() {
        check("/Subscriptions/42d9eac4-d29a-4d6e-9e26-3439758b1491").unwrap();
        check("/Subscriptions/42d9eac4-d29a-4d6e-9e26-3439758b1491/ResourceGroups/MyResourceGroup/Providers/Microsoft.RedHatOpenShift/HCPOpenShiftClusters/MyCluster").unwrap();
        check(&format!("/subscriptions/{SUB}/resourcegroups/rg/providers/microsoft.redhatopenshift/hcpopenshiftclusters/dev/nodepools")).unwrap();
    }

    #[test]
    fn test_invalid_subscription() {
        let err = check("/Subscriptions/invalid!sub!id").unwrap_err();
        assert_eq!(err.body().code, "InvalidSubscriptionID");
    }

    #[test]
    fn test_invalid_cluster_names() {
        let long = "a".repeat(55);
        for name in ["$", "-garbage", "a", long.as_str()] {
            let err = check(&format!(
                "/SUBSCRIPTIONS/{SUB}/RESOURCEGROUPS/MyResourceGroup/PROVIDERS/MICROSOFT.REDHATOPENSHIFT/HCPOPENSHIFTCLUSTERS/{name}"
            ))
            .unwrap_err();
            assert_eq!(err.body().code, "InvalidResourceName");
            assert_eq!(
                err.body().message,
                format!("The Resource 'MICROSOFT.REDHATOPENSHIFT/HCPOPENSHIFTCLUSTERS/{name}' under resource group 'MyResourceGroup' does not conform to the naming restriction.")
            );
        }
    }

    #[test]
    fn test_invalid_node_pool_names() {
        for name in ["$", "-abcde", "07B4gc00vjA2C8KL3Ns4No9fi", "a"] {
            let err = check(&format!(
                "/SUBSCRIPTIONS/{SUB}/RESOURCEGROUPS/MyResourceGroup/PROVIDERS/MICROSOFT.REDHATOPENSHIFT/HCPOPENSHIFTCLUSTERS/myCluster/NODEPOOLS/{name}"
            ))
            .unwrap_err();
            assert_eq!(
                err.body().message,
                format!("The Resource 'MICROSOFT.REDHATOPENSHIFT/HCPOPENSHIFTCLUSTERS/NODEPOOLS/{name}' under resource group 'MyResourceGroup' does not conform to the naming restriction.")
            );
        }
    }

    #[test]
    fn test_resource_group_rule() {
        assert!(is_valid_resource_group_name("my-rg_(1).x"));
        assert!(!is_valid_resource_group_name("ends."));
        assert!(!is_valid_resource_group_name(&"r".repeat(91)));
        assert!(!is_valid_resource_group_name("bad!name"));

        let err = check(&format!("/subscriptions/{SUB}/resourceGroups/bad!name")).unwrap_err();
        assert_eq!(err.body().code, "InvalidResourceGroupName");
    }

    #[test]
    fn test_outermost_error_wins() {
        let err = check("/subscriptions/nope/resourceGroups/rg/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/$").unwrap_err();
        assert_eq!(err.body().code, "InvalidSubscriptionID");
    }
}
