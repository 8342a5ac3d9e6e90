//! Backend configuration.
//!
//! Assembled from environment variables with sensible defaults, the same
//! way the daemon's other services read their settings. Deployments that
//! load a config file deserialize [`BackendConfig`] directly instead.

use serde::{Deserialize, Serialize};

use authd_core::DomainConfig;
use authd_provider_krb5::Krb5Config;
use authd_provider_ldap::{LdapProviderConfig, TlsPolicy};

use crate::error::{InitError, InitResult};

/// Everything the backend needs to initialize.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Domain-level knobs shared by both providers.
    pub domain: DomainConfig,

    /// Identity-provider settings.
    pub ldap: LdapProviderConfig,

    /// Auth-provider settings.
    pub krb5: Krb5Config,
}

impl BackendConfig {
    /// Loads the configuration from `AUTHD_*` environment variables.
    ///
    /// ## Errors
    ///
    /// Fails on values that do not parse, e.g. an unknown `tls_reqcert`
    /// policy.
    pub fn from_env() -> InitResult<Self> {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("AUTHD_DOMAIN") {
            config.domain.name = name;
        }
        config.domain.enumerate = env_bool("AUTHD_ENUMERATE", config.domain.enumerate);
        config.domain.cache_credentials =
            env_bool("AUTHD_CACHE_CREDENTIALS", config.domain.cache_credentials);

        if let Ok(uri) = std::env::var("AUTHD_LDAP_URI") {
            config.ldap.uri = uri;
        }
        if let Ok(base) = std::env::var("AUTHD_LDAP_SEARCH_BASE") {
            config.ldap.search_base = base;
        }
        config.ldap.use_starttls = env_bool("AUTHD_LDAP_STARTTLS", config.ldap.use_starttls);
        if let Ok(policy) = std::env::var("AUTHD_TLS_REQCERT") {
            config.ldap.tls_reqcert = policy.parse::<TlsPolicy>()?;
        }
        config.ldap.default_bind_dn = std::env::var("AUTHD_LDAP_BIND_DN").ok();
        config.ldap.default_authtok_type = std::env::var("AUTHD_LDAP_AUTHTOK_TYPE").ok();
        config.ldap.default_authtok = std::env::var("AUTHD_LDAP_AUTHTOK").ok();
        config.ldap.offline_timeout =
            env_u64("AUTHD_OFFLINE_TIMEOUT", config.ldap.offline_timeout)?;
        config.ldap.enum_refresh_timeout = env_u64(
            "AUTHD_ENUM_REFRESH_TIMEOUT",
            config.ldap.enum_refresh_timeout,
        )?;

        config.krb5.kdc_addr = std::env::var("AUTHD_KRB5_KDCIP").ok();
        config.krb5.realm = std::env::var("AUTHD_KRB5_REALM").ok();
        config.krb5.try_simple_upn =
            env_bool("AUTHD_KRB5_TRY_SIMPLE_UPN", config.krb5.try_simple_upn);
        if let Ok(principal) = std::env::var("AUTHD_KRB5_CHANGEPW_PRINCIPLE") {
            config.krb5.changepw_principal = principal;
        }
        if let Ok(helper) = std::env::var("AUTHD_KRB5_HELPER") {
            config.krb5.helper_path = helper.into();
        }

        Ok(config)
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> InitResult<u64> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| InitError::config(format!("{name} must be an integer"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_initializes() {
        let config = BackendConfig::default();
        assert!(config.ldap.validate().is_ok());
        assert!(!config.domain.enumerate);
    }

    #[test]
    fn unknown_tls_policy_fails_env_load() {
        std::env::set_var("AUTHD_TLS_REQCERT", "bogus");
        let result = BackendConfig::from_env();
        std::env::remove_var("AUTHD_TLS_REQCERT");

        assert!(result.is_err());
    }
}
