//! Trace attribute and baggage keys.

/// Correlation request ID.
pub const CORRELATION_ID: &str = "aro.correlation_id";
/// Client request ID.
pub const CLIENT_REQUEST_ID: &str = "aro.client.request_id";
/// Server request ID.
pub const REQUEST_ID: &str = "aro.request_id";
/// Requested API version.
pub const API_VERSION: &str = "aro.api_version";
/// Subscription ID.
pub const SUBSCRIPTION_ID: &str = "aro.subscription.id";
/// Subscription state.
pub const SUBSCRIPTION_STATE: &str = "aro.subscription.state";
/// Resource group name.
pub const RESOURCE_GROUP_NAME: &str = "aro.resource_group.name";
/// Resource name.
pub const RESOURCE_NAME: &str = "aro.resource.name";
/// Resource type.
pub const RESOURCE_TYPE: &str = "aro.resource.type";
/// Full resource ID.
pub const CLOUD_RESOURCE_ID: &str = "cloud.resource_id";
/// Operation ID.
pub const OPERATION_ID: &str = "aro.operation.id";
/// Operation request kind.
pub const OPERATION_TYPE: &str = "aro.operation.type";
/// Operation status.
pub const OPERATION_STATUS: &str = "aro.operation.status";
