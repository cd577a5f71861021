//! Header names used across the frontend.

use http::HeaderName;

/// Caller-supplied request ID.
pub const CLIENT_REQUEST_ID: HeaderName = HeaderName::from_static("x-ms-client-request-id");

/// Caller-supplied correlation ID.
pub const CORRELATION_REQUEST_ID: HeaderName = HeaderName::from_static("x-ms-correlation-request-id");

/// When `true`, the client request ID is echoed in the response.
pub const RETURN_CLIENT_REQUEST_ID: HeaderName =
    HeaderName::from_static("x-ms-return-client-request-id");

/// Server-generated request ID.
pub const REQUEST_ID: HeaderName = HeaderName::from_static("x-ms-request-id");

/// Home tenant of the caller.
pub const HOME_TENANT_ID: HeaderName = HeaderName::from_static("x-ms-home-tenant-id");

/// Object ID of the calling principal.
pub const CLIENT_OBJECT_ID: HeaderName = HeaderName::from_static("x-ms-client-object-id");

/// Name of the calling principal.
pub const CLIENT_PRINCIPAL_NAME: HeaderName = HeaderName::from_static("x-ms-client-principal-name");

/// ARM system metadata, JSON encoded.
pub const ARM_RESOURCE_SYSTEM_DATA: HeaderName =
    HeaderName::from_static("x-ms-arm-resource-system-data");

/// Where to send operation completion notifications.
pub const ASYNC_NOTIFICATION_URI: HeaderName = HeaderName::from_static("azure-asyncnotificationuri");

/// Signals that completion notifications are enabled.
pub const ASYNC_NOTIFICATION: HeaderName = HeaderName::from_static("azure-asyncnotification");

/// Operation status polling URL.
pub const ASYNC_OPERATION: HeaderName = HeaderName::from_static("azure-asyncoperation");

/// Error code of an error response.
pub const ERROR_CODE: HeaderName = HeaderName::from_static("x-ms-error-code");

/// Query parameter carrying the API version.
pub const API_VERSION_PARAMETER: &str = "api-version";
