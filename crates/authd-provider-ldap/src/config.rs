//! LDAP provider configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::attrmap::AttributeMap;
use crate::error::{IdError, IdResult};

// ============================================================================
// TLS certificate policy
// ============================================================================

/// Server-certificate checking policy (`tls_reqcert`).
///
/// Mirrors the classic five-way LDAP client option. `ldap3` exposes a
/// single verification knob, so `Never`/`Allow`/`Try` disable peer
/// verification and `Demand`/`Hard` require it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsPolicy {
    /// Never request a certificate.
    Never,
    /// Request a certificate but accept any, including none.
    Allow,
    /// Request a certificate and accept a bad one.
    Try,
    /// Require a valid certificate.
    #[default]
    Demand,
    /// Same as `Demand` (historical alias).
    Hard,
}

impl TlsPolicy {
    /// Whether the policy requires peer-certificate verification.
    #[must_use]
    pub const fn verifies_peer(&self) -> bool {
        matches!(self, Self::Demand | Self::Hard)
    }
}

impl FromStr for TlsPolicy {
    type Err = IdError;

    /// Parses the configuration string, case-insensitively.
    ///
    /// Unknown values are a fatal configuration error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "never" => Ok(Self::Never),
            "allow" => Ok(Self::Allow),
            "try" => Ok(Self::Try),
            "demand" => Ok(Self::Demand),
            "hard" => Ok(Self::Hard),
            _ => Err(IdError::Config("Unknown value for tls_reqcert")),
        }
    }
}

impl fmt::Display for TlsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Never => "never",
            Self::Allow => "allow",
            Self::Try => "try",
            Self::Demand => "demand",
            Self::Hard => "hard",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Provider configuration
// ============================================================================

/// Configuration of the LDAP identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapProviderConfig {
    /// Directory server URI (`ldap://` or `ldaps://`).
    pub uri: String,

    /// Whether to upgrade a plain connection with STARTTLS.
    pub use_starttls: bool,

    /// Server-certificate checking policy.
    pub tls_reqcert: TlsPolicy,

    /// Base DN for searches.
    pub search_base: String,

    /// DN to bind as; anonymous bind when unset.
    pub default_bind_dn: Option<String>,

    /// Type of the bind credential; only `password` is supported
    /// (SASL/GSSAPI is a recognized future variant).
    pub default_authtok_type: Option<String>,

    /// Bind credential.
    #[serde(skip_serializing)]
    pub default_authtok: Option<String>,

    /// Seconds the backend stays offline after a transport failure.
    pub offline_timeout: u64,

    /// Seconds between enumeration cycles, measured from the start of the
    /// previous cycle; also the per-cycle watchdog budget.
    pub enum_refresh_timeout: u64,

    /// Transport connect timeout in seconds.
    pub connect_timeout: u64,

    /// User attribute map.
    pub user_map: AttributeMap,

    /// Group attribute map.
    pub group_map: AttributeMap,
}

impl Default for LdapProviderConfig {
    fn default() -> Self {
        Self {
            uri: "ldap://localhost".to_string(),
            use_starttls: false,
            tls_reqcert: TlsPolicy::default(),
            search_base: String::new(),
            default_bind_dn: None,
            default_authtok_type: None,
            default_authtok: None,
            offline_timeout: 60,
            enum_refresh_timeout: 300,
            connect_timeout: 6,
            user_map: AttributeMap::users_rfc2307(),
            group_map: AttributeMap::groups_rfc2307(),
        }
    }
}

impl LdapProviderConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> IdResult<()> {
        let uri = self.uri.to_ascii_lowercase();
        if !uri.starts_with("ldap://") && !uri.starts_with("ldaps://") {
            return Err(IdError::Config(
                "uri must use the ldap:// or ldaps:// scheme",
            ));
        }
        if self.enum_refresh_timeout == 0 {
            return Err(IdError::Config(
                "enum_refresh_timeout must be positive",
            ));
        }
        if self.user_map.name.is_empty() || self.group_map.name.is_empty() {
            return Err(IdError::Config(
                "attribute maps must map the name attribute",
            ));
        }
        Ok(())
    }

    /// Sticky-offline window.
    #[must_use]
    pub const fn offline_window(&self) -> Duration {
        Duration::from_secs(self.offline_timeout)
    }

    /// Enumeration refresh period / watchdog budget.
    #[must_use]
    pub const fn enum_refresh(&self) -> Duration {
        Duration::from_secs(self.enum_refresh_timeout)
    }

    /// Transport connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}

/// Escapes special characters in an LDAP filter value (RFC 4515).
#[must_use]
pub fn ldap_escape(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\5c"),
            '*' => result.push_str("\\2a"),
            '(' => result.push_str("\\28"),
            ')' => result.push_str("\\29"),
            '\0' => result.push_str("\\00"),
            _ => result.push(c),
        }
    }
    result
}
