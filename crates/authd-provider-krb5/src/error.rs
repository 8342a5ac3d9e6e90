//! Auth-provider error types.
//!
//! ## Security Note
//!
//! Authentication tokens never appear in error messages.

use authd_core::PamStatus;
use authd_store::StoreError;
use thiserror::Error;

/// Errors raised while handling a PAM task.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No principal name could be determined for the user.
    #[error("cannot determine user principal name")]
    MissingUpn,

    /// Spawning the helper or talking to it over the pipes failed.
    #[error("credential helper failure: {0}")]
    Child(String),

    /// The helper's reply did not match the wire format.
    #[error("malformed helper reply: {0}")]
    Protocol(String),

    /// Reading from the local store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Creates a child failure.
    #[must_use]
    pub fn child(msg: impl Into<String>) -> Self {
        Self::Child(msg.into())
    }

    /// Creates a protocol error.
    #[must_use]
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// The PAM status reported for this error.
    ///
    /// Everything maps to a system error: the caller cannot fix any of
    /// these by retyping a password.
    #[must_use]
    pub const fn pam_status(&self) -> PamStatus {
        PamStatus::SystemErr
    }
}

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;
