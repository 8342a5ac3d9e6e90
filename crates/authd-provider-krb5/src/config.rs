//! Kerberos provider configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable carrying the realm to the helper child.
pub const ENV_REALM: &str = "SSSD_REALM";

/// Environment variable carrying the KDC address to the helper child.
pub const ENV_KDC: &str = "SSSD_KDC";

/// Environment variable carrying the change-password principal.
pub const ENV_CHANGEPW_PRINCIPLE: &str = "SSSD_KRB5_CHANGEPW_PRINCIPLE";

/// Raw configuration as read from the config database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Krb5Config {
    /// KDC address (`krb5KDCIP`). Authentication may fail without it.
    pub kdc_addr: Option<String>,

    /// Kerberos realm (`krb5REALM`).
    pub realm: Option<String>,

    /// Synthesize `user@REALM` when the store has no principal name for
    /// the user (`krb5try_simple_upn`). Works only in some environments.
    pub try_simple_upn: bool,

    /// Principal for password changes (`krb5changepw_principle`).
    pub changepw_principal: String,

    /// Path of the privilege-separated credential helper.
    pub helper_path: PathBuf,
}

impl Default for Krb5Config {
    fn default() -> Self {
        Self {
            kdc_addr: None,
            realm: None,
            try_simple_upn: false,
            changepw_principal: "kadmin/changepw".to_string(),
            helper_path: PathBuf::from("/usr/libexec/authd/krb5-helper"),
        }
    }
}

/// The resolved Kerberos context; read-only after init.
#[derive(Debug, Clone)]
pub struct Krb5Context {
    /// KDC address.
    pub kdc_addr: Option<String>,

    /// Kerberos realm.
    pub realm: Option<String>,

    /// Whether to synthesize a simple UPN as a fallback.
    pub try_simple_upn: bool,

    /// Fully qualified change-password principal.
    pub changepw_principal: String,

    /// Helper binary path.
    pub helper_path: PathBuf,
}

impl Krb5Context {
    /// Resolves the context from raw configuration.
    ///
    /// The change-password principal is suffixed with `@<realm>` when it
    /// carries no realm of its own.
    #[must_use]
    pub fn from_config(config: Krb5Config) -> Self {
        let changepw_principal = match (&config.realm, config.changepw_principal.contains('@')) {
            (Some(realm), false) => format!("{}@{}", config.changepw_principal, realm),
            _ => config.changepw_principal,
        };

        Self {
            kdc_addr: config.kdc_addr,
            realm: config.realm,
            try_simple_upn: config.try_simple_upn,
            changepw_principal,
            helper_path: config.helper_path,
        }
    }

    /// Exports the context into the process environment for the helper
    /// child to inherit.
    pub fn export_environment(&self) {
        match &self.realm {
            Some(realm) => std::env::set_var(ENV_REALM, realm),
            None => tracing::info!("no realm configured, authentication might fail"),
        }
        match &self.kdc_addr {
            Some(kdc) => std::env::set_var(ENV_KDC, kdc),
            None => tracing::info!("no KDC address configured, authentication might fail"),
        }
        std::env::set_var(ENV_CHANGEPW_PRINCIPLE, &self.changepw_principal);
    }
}
