//! Store error types.

use thiserror::Error;

/// Result type alias using [`StoreError`].
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by document stores and lock clients.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested document does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A document with the same key already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An optimistic-concurrency check failed.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// A bounded wait ran out.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Anything else the backend reports.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl StoreError {
    /// Whether this is [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether this is [`StoreError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
