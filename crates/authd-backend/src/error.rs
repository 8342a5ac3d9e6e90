//! Backend init errors.
//!
//! Everything here is fatal: a backend that cannot initialize aborts the
//! daemon rather than limp along misconfigured.

use authd_provider_ldap::IdError;
use thiserror::Error;

/// Fatal initialization failures.
#[derive(Debug, Error)]
pub enum InitError {
    /// The identity provider refused its configuration.
    #[error("identity provider: {0}")]
    Id(#[from] IdError),

    /// A backend-level configuration value is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl InitError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type for backend initialization.
pub type InitResult<T> = Result<T, InitError>;
