//! Cloud error model.
//!
//! Every error the frontend returns to a client is a [`CloudError`]: an HTTP
//! status plus a [`CloudErrorBody`] rendered as
//! `{"error":{"code":...,"message":...,"target":...,"details":[...]}}`.
//! The error code is also echoed in the `x-ms-error-code` response header.

use crate::resource_id::ResourceId;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias using [`CloudError`].
pub type CloudResult<T> = Result<T, CloudError>;

/// Well-known error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloudErrorCode {
    /// Unexpected server-side failure.
    InternalServerError,
    /// A request parameter is missing or invalid.
    InvalidParameter,
    /// The request body could not be decoded.
    InvalidRequestContent,
    /// The resource definition is invalid.
    InvalidResource,
    /// The resource type is not available at this API version.
    InvalidResourceType,
    /// More than one validation error; see details.
    MultipleErrorsOccurred,
    /// The request media type is not supported.
    UnsupportedMediaType,
    /// The operation was canceled.
    Canceled,
    /// The request conflicts with the current resource state.
    Conflict,
    /// The path did not match any route.
    NotFound,
    /// The subscription state forbids the request.
    InvalidSubscriptionState,
    /// The subscription does not exist.
    SubscriptionNotFound,
    /// The resource does not exist.
    ResourceNotFound,
    /// The resource group does not exist.
    ResourceGroupNotFound,
    /// The subscription ID is malformed.
    InvalidSubscriptionId,
    /// The resource name violates naming rules.
    InvalidResourceName,
    /// The resource group name violates naming rules.
    InvalidResourceGroupName,
}

impl CloudErrorCode {
    /// The wire form of the code.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InternalServerError => "InternalServerError",
            Self::InvalidParameter => "InvalidParameter",
            Self::InvalidRequestContent => "InvalidRequestContent",
            Self::InvalidResource => "InvalidResource",
            Self::InvalidResourceType => "InvalidResourceType",
            Self::MultipleErrorsOccurred => "MultipleErrorsOccurred",
            Self::UnsupportedMediaType => "UnsupportedMediaType",
            Self::Canceled => "Canceled",
            Self::Conflict => "Conflict",
            Self::NotFound => "NotFound",
            Self::InvalidSubscriptionState => "InvalidSubscriptionState",
            Self::SubscriptionNotFound => "SubscriptionNotFound",
            Self::ResourceNotFound => "ResourceNotFound",
            Self::ResourceGroupNotFound => "ResourceGroupNotFound",
            Self::InvalidSubscriptionId => "InvalidSubscriptionID",
            Self::InvalidResourceName => "InvalidResourceName",
            Self::InvalidResourceGroupName => "InvalidResourceGroupName",
        }
    }
}

impl fmt::Display for CloudErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The serialized body of a cloud error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudErrorBody {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// The element the error applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Nested errors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<CloudErrorBody>,
}

impl CloudErrorBody {
    /// Creates a body with no target and no details.
    pub fn new(code: CloudErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.as_str().to_string(),
            message: message.into(),
            target: None,
            details: Vec::new(),
        }
    }

    /// Sets the target.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Sets the nested details.
    pub fn with_details(mut self, details: Vec<CloudErrorBody>) -> Self {
        self.details = details;
        self
    }
}

impl fmt::Display for CloudErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(target) = &self.target {
            write!(f, " (target: {target})")?;
        }
        Ok(())
    }
}

/// Wire envelope around a [`CloudErrorBody`].
#[derive(Debug, Serialize)]
pub struct CloudErrorEnvelope<'a> {
    /// The error body.
    pub error: &'a CloudErrorBody,
}

/// An error response: HTTP status plus body.
///
/// # Example
///
/// ```
/// use meridian_core::{CloudError, CloudErrorCode};
/// use http::StatusCode;
///
/// let err = CloudError::invalid_parameter_missing("api-version");
/// assert_eq!(err.status(), StatusCode::BAD_REQUEST);
/// assert_eq!(err.body().code, CloudErrorCode::InvalidParameter.as_str());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{status}: {body}")]
pub struct CloudError {
    status: StatusCode,
    body: CloudErrorBody,
}

impl CloudError {
    /// Creates an error from its parts.
    pub fn new(status: StatusCode, code: CloudErrorCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: CloudErrorBody::new(code, message),
        }
    }

    /// Creates an error from a prebuilt body.
    pub fn from_body(status: StatusCode, body: CloudErrorBody) -> Self {
        Self { status, body }
    }

    /// Sets the target.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.body.target = Some(target.into());
        self
    }

    /// The HTTP status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The error body.
    pub fn body(&self) -> &CloudErrorBody {
        &self.body
    }

    /// Serializes the wire envelope.
    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(&CloudErrorEnvelope { error: &self.body }).unwrap_or_default()
    }

    /// `500 InternalServerError` with an opaque message.
    pub fn internal_server_error() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            CloudErrorCode::InternalServerError,
            "Internal server error.",
        )
    }

    /// `404 NotFound` for paths no route matches.
    pub fn not_found() -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            CloudErrorCode::NotFound,
            "The requested path could not be found.",
        )
    }

    /// `404` for a resource, resource group or subscription that does not exist.
    pub fn resource_not_found(resource_id: &ResourceId) -> Self {
        let (code, message) = if resource_id.is_subscription() {
            (
                CloudErrorCode::SubscriptionNotFound,
                format!("The subscription '{}' was not found.", resource_id.name()),
            )
        } else if resource_id.is_resource_group() {
            (
                CloudErrorCode::ResourceGroupNotFound,
                format!(
                    "The resource group '{}' under subscription '{}' was not found.",
                    resource_id.name(),
                    resource_id.subscription_id()
                ),
            )
        } else {
            (
                CloudErrorCode::ResourceNotFound,
                format!(
                    "The resource '{}' under resource group '{}' was not found.",
                    resource_id.provider_relative_name(),
                    resource_id.resource_group_name()
                ),
            )
        };
        Self::new(StatusCode::NOT_FOUND, code, message).with_target(resource_id.to_string())
    }

    /// `409 Conflict` targeted at a resource.
    pub fn conflict(resource_id: &ResourceId, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, CloudErrorCode::Conflict, message)
            .with_target(resource_id.to_string())
    }

    /// `409 Conflict` returned when the subscription lock could not be obtained or was lost.
    pub fn subscription_busy() -> Self {
        Self::new(
            StatusCode::CONFLICT,
            CloudErrorCode::Conflict,
            "Another request is being processed for this subscription. Retry the request later.",
        )
    }

    /// `400 InvalidRequestContent` for a body that failed to decode.
    pub fn invalid_request_content(detail: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            CloudErrorCode::InvalidRequestContent,
            format!("The request content was invalid and could not be deserialized: {detail}"),
        )
    }

    /// `400 InvalidParameter` for a missing required parameter.
    pub fn invalid_parameter_missing(name: &str) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            CloudErrorCode::InvalidParameter,
            format!("The request is missing required parameter '{name}'."),
        )
    }

    /// `400 InvalidResource` for a body over the size limit.
    pub fn request_too_large(limit: usize) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            CloudErrorCode::InvalidResource,
            format!("The resource definition exceeds the maximum size of {limit} bytes."),
        )
    }

    /// `415 UnsupportedMediaType`.
    pub fn unsupported_media_type(content_type: &str) -> Self {
        Self::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            CloudErrorCode::UnsupportedMediaType,
            format!(
                "The content media type '{content_type}' is not supported. Only 'application/json' is supported."
            ),
        )
    }

    /// `400 InvalidResourceType` for an API version without the resource type.
    pub fn unsupported_api_version(resource_type: &str, api_version: &str) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            CloudErrorCode::InvalidResourceType,
            format!(
                "The resource type '{resource_type}' could not be found for the API version '{api_version}'."
            ),
        )
    }

    /// `400 InvalidSubscriptionID`.
    pub fn invalid_subscription_id(subscription_id: &str) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            CloudErrorCode::InvalidSubscriptionId,
            format!("The provided subscription identifier '{subscription_id}' is malformed or invalid."),
        )
    }

    /// `400 InvalidResourceGroupName`.
    pub fn invalid_resource_group_name(name: &str) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            CloudErrorCode::InvalidResourceGroupName,
            format!("Resource group '{name}' could not be found or does not conform to the naming restriction."),
        )
    }

    /// `400 InvalidResourceName`.
    pub fn invalid_resource_name(resource_type: &str, name: &str, resource_group: &str) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            CloudErrorCode::InvalidResourceName,
            format!(
                "The Resource '{resource_type}/{name}' under resource group '{resource_group}' does not conform to the naming restriction."
            ),
        )
    }

    /// Collapses field-level errors into one `400` response.
    ///
    /// A single detail is returned as-is; several are wrapped in
    /// `MultipleErrorsOccurred`.
    pub fn from_details(mut details: Vec<CloudErrorBody>) -> Self {
        if details.len() == 1 {
            if let Some(only) = details.pop() {
                return Self::from_body(StatusCode::BAD_REQUEST, only);
            }
        }
        Self::from_body(
            StatusCode::BAD_REQUEST,
            CloudErrorBody::new(
                CloudErrorCode::MultipleErrorsOccurred,
                "Content validation failed on multiple fields",
            )
            .with_details(details),
        )
    }
}
