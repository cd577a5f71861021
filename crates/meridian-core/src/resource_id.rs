//! ARM resource identifiers.
//!
//! A [`ResourceId`] is an ordered chain of `(resource type, name)` segments.
//! Walking [`ResourceId::parent`] always terminates at the tenant root
//! (`Microsoft.Resources/tenants`). Parsing is case-insensitive on the
//! structural keywords (`subscriptions`, `resourceGroups`, `providers`) and
//! preserves the casing of everything else.
//!
//! # Example
//!
//! ```
//! use meridian_core::ResourceId;
//!
//! let id = ResourceId::parse(
//!     "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/dev",
//! )
//! .unwrap();
//!
//! assert_eq!(id.name(), "dev");
//! assert_eq!(id.resource_group_name(), "rg");
//! assert_eq!(id.resource_type().to_string(), "Microsoft.RedHatOpenShift/hcpOpenShiftClusters");
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Namespace of the built-in resource types.
pub const RESOURCES_NAMESPACE: &str = "Microsoft.Resources";

const SUBSCRIPTIONS_KEY: &str = "subscriptions";
const RESOURCE_GROUPS_KEY: &str = "resourceGroups";
const PROVIDERS_KEY: &str = "providers";
const LOCATIONS_KEY: &str = "locations";

/// Errors produced while parsing resource identifiers and types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceIdError {
    /// The identifier was empty.
    #[error("invalid resource ID: id cannot be empty")]
    Empty,

    /// The identifier did not start with `/`.
    #[error("invalid resource ID: resource id '{0}' must start with '/'")]
    MissingLeadingSlash(String),

    /// The identifier is structurally invalid.
    #[error("invalid resource ID: {0}")]
    Invalid(String),

    /// The resource type string is structurally invalid.
    #[error("invalid resource type: {0}")]
    InvalidType(String),
}

/// A resource type such as `Microsoft.RedHatOpenShift/hcpOpenShiftClusters/nodePools`.
///
/// Equality is case-insensitive.
#[derive(Debug, Clone)]
pub struct ResourceType {
    namespace: String,
    types: Vec<String>,
}

impl ResourceType {
    /// Creates a top-level resource type within a namespace.
    pub fn new(namespace: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            types: vec![type_name.into()],
        }
    }

    /// The tenant root type.
    pub fn tenant() -> Self {
        Self::new(RESOURCES_NAMESPACE, "tenants")
    }

    /// The subscription type.
    pub fn subscription() -> Self {
        Self::new(RESOURCES_NAMESPACE, SUBSCRIPTIONS_KEY)
    }

    /// The resource group type.
    pub fn resource_group() -> Self {
        Self::new(RESOURCES_NAMESPACE, RESOURCE_GROUPS_KEY)
    }

    /// The provider registration type.
    pub fn provider() -> Self {
        Self::new(RESOURCES_NAMESPACE, PROVIDERS_KEY)
    }

    /// Parses `Namespace/type[/childType...]`.
    pub fn parse(value: &str) -> Result<Self, ResourceIdError> {
        let mut parts = value.split('/').filter(|p| !p.is_empty());
        let namespace = parts
            .next()
            .ok_or_else(|| ResourceIdError::InvalidType(value.to_string()))?;
        let types: Vec<String> = parts.map(str::to_string).collect();
        if types.is_empty() {
            return Err(ResourceIdError::InvalidType(value.to_string()));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            types,
        })
    }

    /// Returns a child type nested under this one.
    pub fn append_child(&self, child: impl Into<String>) -> Self {
        let mut types = self.types.clone();
        types.push(child.into());
        Self {
            namespace: self.namespace.clone(),
            types,
        }
    }

    /// The provider namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The type segments below the namespace.
    pub fn types(&self) -> &[String] {
        &self.types
    }

    /// The innermost type segment.
    pub fn last_type(&self) -> &str {
        self.types.last().map_or("", String::as_str)
    }
}

impl PartialEq for ResourceType {
    fn eq(&self, other: &Self) -> bool {
        self.namespace.eq_ignore_ascii_case(&other.namespace)
            && self.types.len() == other.types.len()
            && self
                .types
                .iter()
                .zip(&other.types)
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

impl Eq for ResourceType {}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.types.join("/"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentKind {
    Root,
    Subscription,
    ResourceGroup,
    Provider,
    TopLevel,
    Child,
}

/// A parsed ARM resource identifier.
#[derive(Debug, Clone)]
pub struct ResourceId {
    parent: Option<Box<ResourceId>>,
    resource_type: ResourceType,
    name: String,
    kind: SegmentKind,
    subscription_id: String,
    resource_group_name: String,
    provider: String,
    location: String,
    string_value: String,
}

impl ResourceId {
    /// The tenant root.
    pub fn root() -> Self {
        Self {
            parent: None,
            resource_type: ResourceType::tenant(),
            name: String::new(),
            kind: SegmentKind::Root,
            subscription_id: String::new(),
            resource_group_name: String::new(),
            provider: String::new(),
            location: String::new(),
            string_value: String::new(),
        }
    }

    /// Parses a resource identifier path.
    pub fn parse(id: &str) -> Result<Self, ResourceIdError> {
        if id.is_empty() {
            return Err(ResourceIdError::Empty);
        }
        if !id.starts_with('/') {
            return Err(ResourceIdError::MissingLeadingSlash(id.to_string()));
        }

        let parts: Vec<&str> = id.split('/').filter(|p| !p.is_empty()).collect();
        if parts.len() < 2 {
            return Err(ResourceIdError::Invalid(id.to_string()));
        }
        if !parts[0].eq_ignore_ascii_case(SUBSCRIPTIONS_KEY)
            && !parts[0].eq_ignore_ascii_case(PROVIDERS_KEY)
        {
            return Err(ResourceIdError::Invalid(id.to_string()));
        }

        Self::append_next(Self::root(), &parts, id)
    }

    fn append_next(parent: Self, parts: &[&str], id: &str) -> Result<Self, ResourceIdError> {
        match parts {
            [] => Ok(parent),
            [single] => {
                if single.eq_ignore_ascii_case(SUBSCRIPTIONS_KEY)
                    || single.eq_ignore_ascii_case(RESOURCE_GROUPS_KEY)
                {
                    return Err(ResourceIdError::Invalid(id.to_string()));
                }
                let resource_type = parent.resource_type.append_child(*single);
                Ok(Self::extend(parent, resource_type, "", SegmentKind::Child))
            }
            [first, rest @ ..] if first.eq_ignore_ascii_case(PROVIDERS_KEY) => {
                if rest.len() == 1 || rest[1].eq_ignore_ascii_case(PROVIDERS_KEY) {
                    if parent.kind != SegmentKind::Root && parent.kind != SegmentKind::Subscription {
                        return Err(ResourceIdError::Invalid(id.to_string()));
                    }
                    let provider =
                        Self::extend(parent, ResourceType::provider(), rest[0], SegmentKind::Provider);
                    return Self::append_next(provider, &rest[1..], id);
                }

                let resource_type = ResourceType::new(rest[0], rest[1]);
                let name = rest.get(2).copied().unwrap_or("");
                let next = Self::extend(parent, resource_type, name, SegmentKind::TopLevel);
                let remaining: &[&str] = if rest.len() > 2 { &rest[3..] } else { &[] };
                Self::append_next(next, remaining, id)
            }
            [first, name, rest @ ..] => {
                let next = if first.eq_ignore_ascii_case(SUBSCRIPTIONS_KEY)
                    && parent.kind == SegmentKind::Root
                {
                    Self::extend(parent, ResourceType::subscription(), name, SegmentKind::Subscription)
                } else if first.eq_ignore_ascii_case(RESOURCE_GROUPS_KEY)
                    && parent.kind == SegmentKind::Subscription
                {
                    Self::extend(
                        parent,
                        ResourceType::resource_group(),
                        name,
                        SegmentKind::ResourceGroup,
                    )
                } else if parent.kind == SegmentKind::Root {
                    return Err(ResourceIdError::Invalid(id.to_string()));
                } else {
                    let resource_type = parent.resource_type.append_child(*first);
                    Self::extend(parent, resource_type, name, SegmentKind::Child)
                };
                Self::append_next(next, rest, id)
            }
        }
    }

    fn extend(parent: Self, resource_type: ResourceType, name: &str, kind: SegmentKind) -> Self {
        let mut subscription_id = parent.subscription_id.clone();
        let mut resource_group_name = parent.resource_group_name.clone();
        let mut provider = parent.provider.clone();
        let mut location = parent.location.clone();

        match kind {
            SegmentKind::Subscription => subscription_id = name.to_string(),
            SegmentKind::ResourceGroup => resource_group_name = name.to_string(),
            SegmentKind::Provider => provider = name.to_string(),
            _ => {}
        }
        if resource_type.last_type().eq_ignore_ascii_case(LOCATIONS_KEY) {
            location = name.to_string();
        }

        let mut string_value = parent.string_value.clone();
        match kind {
            SegmentKind::Root => {}
            SegmentKind::Subscription => {
                string_value.push_str(&format!("/{SUBSCRIPTIONS_KEY}/{name}"));
            }
            SegmentKind::ResourceGroup => {
                string_value.push_str(&format!("/{RESOURCE_GROUPS_KEY}/{name}"));
            }
            SegmentKind::Provider => {
                string_value.push_str(&format!("/{PROVIDERS_KEY}/{name}"));
            }
            SegmentKind::TopLevel => {
                string_value.push_str(&format!(
                    "/{PROVIDERS_KEY}/{}/{}",
                    resource_type.namespace(),
                    resource_type.last_type()
                ));
                if !name.is_empty() {
                    string_value.push('/');
                    string_value.push_str(name);
                }
            }
            SegmentKind::Child => {
                string_value.push('/');
                string_value.push_str(resource_type.last_type());
                if !name.is_empty() {
                    string_value.push('/');
                    string_value.push_str(name);
                }
            }
        }

        Self {
            parent: Some(Box::new(parent)),
            resource_type,
            name: name.to_string(),
            kind,
            subscription_id,
            resource_group_name,
            provider,
            location,
            string_value,
        }
    }

    /// The parent identifier, `None` only for the tenant root.
    pub fn parent(&self) -> Option<&ResourceId> {
        self.parent.as_deref()
    }

    /// The resource type of the innermost segment.
    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    /// The name of the innermost segment. Empty for collections and actions.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The subscription the identifier lives under, empty if none.
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// The resource group the identifier lives under, empty if none.
    pub fn resource_group_name(&self) -> &str {
        &self.resource_group_name
    }

    /// The provider namespace registration segment, empty if none.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// The location segment, empty if none.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Whether this is the tenant root.
    pub fn is_root(&self) -> bool {
        self.kind == SegmentKind::Root
    }

    /// Whether this identifier names a subscription.
    pub fn is_subscription(&self) -> bool {
        self.kind == SegmentKind::Subscription
    }

    /// Whether this identifier names a resource group.
    pub fn is_resource_group(&self) -> bool {
        self.kind == SegmentKind::ResourceGroup
    }

    /// Iterates from this identifier up to and including the tenant root.
    pub fn ancestors(&self) -> impl Iterator<Item = &ResourceId> {
        std::iter::successors(Some(self), |id| id.parent())
    }

    /// The path below the provider namespace, e.g. `hcpOpenShiftClusters/dev/nodePools/np1`.
    pub fn provider_relative_name(&self) -> String {
        let mut segments: Vec<String> = self
            .ancestors()
            .take_while(|id| matches!(id.kind, SegmentKind::TopLevel | SegmentKind::Child))
            .map(|id| {
                if id.name.is_empty() {
                    id.resource_type.last_type().to_string()
                } else {
                    format!("{}/{}", id.resource_type.last_type(), id.name)
                }
            })
            .collect();
        segments.reverse();
        segments.join("/")
    }

    /// Lowercased string form, suitable as a storage key.
    pub fn key(&self) -> String {
        self.to_string().to_ascii_lowercase()
    }
}

impl PartialEq for ResourceId {
    fn eq(&self, other: &Self) -> bool {
        self.string_value.eq_ignore_ascii_case(&other.string_value)
    }
}

impl Eq for ResourceId {}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.string_value.is_empty() {
            f.write_str("/")
        } else {
            f.write_str(&self.string_value)
        }
    }
}

impl std::str::FromStr for ResourceId {
    type Err = ResourceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(serde::de::Error::custom)
    }
}
