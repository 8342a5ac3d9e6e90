//! Identity-provider error types.
//!
//! ## Security Note
//!
//! Error messages must not leak bind credentials or authentication tokens.

use authd_core::Completion;
use authd_store::StoreError;
use thiserror::Error;

/// Errors raised while resolving identities from the directory.
#[derive(Debug, Error)]
pub enum IdError {
    /// The request payload was malformed; reported to the caller and
    /// never retried.
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),

    /// Misconfiguration detected at init time; fatal.
    #[error("configuration error: {0}")]
    Config(&'static str),

    /// Opening the transport (or STARTTLS) failed.
    #[error("directory connection failed: {0}")]
    ConnectFailed(String),

    /// The directory rejected the bind.
    #[error("directory bind failed: {0}")]
    BindFailed(String),

    /// The session died underneath an operation.
    #[error("directory connection lost: {0}")]
    NotConnected(String),

    /// A search failed after a good bind.
    #[error("directory search failed: {0}")]
    Directory(String),

    /// Persisting results into the local store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IdError {
    /// Whether this error indicates the server is unreachable.
    ///
    /// Transport errors flip the online tracker to offline; a failed
    /// search after a good bind does not.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed(_) | Self::BindFailed(_) | Self::NotConnected(_)
        )
    }

    /// Maps the error onto the front-end completion contract.
    #[must_use]
    pub fn completion(&self) -> Completion {
        match self {
            Self::InvalidRequest(msg) => Completion::invalid_request(*msg),
            Self::ConnectFailed(_) | Self::NotConnected(_) => {
                Completion::retry_later(self.to_string())
            }
            Self::BindFailed(_) => Completion::auth_failed(self.to_string()),
            Self::Config(_) | Self::Directory(_) | Self::Store(_) => {
                Completion::system_error(self.to_string())
            }
        }
    }
}

/// Result type for identity operations.
pub type IdResult<T> = Result<T, IdError>;
