//! Frontend error types.

use meridian_core::{CloudError, ResourceId};
use thiserror::Error;

/// Errors that stop the server itself.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A listener could not be bound.
    #[error("failed to bind {addr}: {reason}")]
    Bind {
        /// The configured address.
        addr: String,
        /// Why binding failed.
        reason: String,
    },

    /// An I/O error outside of any single connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    pub(crate) fn bind(addr: impl Into<String>, reason: impl ToString) -> Self {
        Self::Bind {
            addr: addr.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors reported by the cluster service.
#[derive(Debug, Error)]
pub enum ClusterServiceError {
    /// The referenced object does not exist.
    #[error("cluster service object not found: {0}")]
    NotFound(String),

    /// The cluster service rejected the request content.
    #[error("cluster service rejected the request: {0}")]
    InvalidRequest(String),

    /// The cluster service could not be reached or failed internally.
    #[error("cluster service unavailable: {0}")]
    Unavailable(String),
}

impl ClusterServiceError {
    /// Converts to the error returned to the caller about `resource_id`.
    pub fn into_cloud_error(self, resource_id: &ResourceId) -> CloudError {
        match self {
            Self::NotFound(_) => CloudError::resource_not_found(resource_id),
            Self::InvalidRequest(message) => {
                CloudError::invalid_request_content(message).with_target(resource_id.to_string())
            }
            Self::Unavailable(message) => {
                tracing::error!(error = %message, "cluster service call failed");
                CloudError::internal_server_error()
            }
        }
    }
}
