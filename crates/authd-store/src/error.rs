//! Local-store error types.

use thiserror::Error;

/// Errors surfaced by the local store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The named record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Password hashing failed.
    #[error("credential hashing error: {0}")]
    Hash(String),

    /// The underlying storage failed.
    #[error("store I/O error: {0}")]
    Io(String),
}

impl StoreError {
    /// Creates a hashing error.
    #[must_use]
    pub fn hash(msg: impl Into<String>) -> Self {
        Self::Hash(msg.into())
    }

    /// Creates an I/O error.
    #[must_use]
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
