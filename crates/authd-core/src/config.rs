//! Per-domain configuration knobs consumed across providers.

use serde::{Deserialize, Serialize};

/// Domain-level settings shared by the identity and auth providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Domain name (used in logs only).
    pub name: String,

    /// Whether the periodic enumeration task runs for this domain.
    pub enumerate: bool,

    /// Whether successful online authentications cache a password hash
    /// in the local store for offline auth.
    pub cache_credentials: bool,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            enumerate: false,
            cache_credentials: false,
        }
    }
}
