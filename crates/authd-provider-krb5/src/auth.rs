//! The PAM authentication pipeline.
//!
//! Resolves the user's principal name, drives the helper child, maps the
//! framed reply onto the PAM request, feeds the online/offline model, and
//! optionally caches the password for offline authentication.

use std::sync::Arc;

use zeroize::Zeroizing;

use authd_core::{
    Completion, DomainConfig, OnlineTracker, PamCommand, PamRequest, PamStatus,
    PAM_RESPONSE_ENV_ITEM,
};
use authd_store::{IdentityStore, ATTR_UPN};

use crate::child;
use crate::config::{Krb5Context, ENV_KDC, ENV_REALM};
use crate::error::{AuthError, AuthResult};
use crate::protocol;

/// The assembled Kerberos authentication provider.
pub struct Krb5AuthProvider {
    ctx: Arc<Krb5Context>,
    domain: DomainConfig,
    store: Arc<dyn IdentityStore>,
    online: Arc<OnlineTracker>,
}

impl Krb5AuthProvider {
    /// Creates the provider.
    #[must_use]
    pub fn new(
        ctx: Krb5Context,
        domain: DomainConfig,
        store: Arc<dyn IdentityStore>,
        online: Arc<OnlineTracker>,
    ) -> Self {
        Self {
            ctx: Arc::new(ctx),
            domain,
            store,
            online,
        }
    }

    /// The resolved Kerberos context.
    #[must_use]
    pub fn context(&self) -> &Krb5Context {
        &self.ctx
    }

    /// Handles one PAM task.
    ///
    /// Sets `pam_status` and the response items on the request and
    /// returns the matching completion. Never returns an error; failures
    /// resolve to a PAM system error.
    pub async fn handle_pam(&self, req: &mut PamRequest) -> Completion {
        let status = match self.run(req).await {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(error = %err, user = %req.user, "PAM task failed");
                err.pam_status().as_i32()
            }
        };

        req.pam_status = status;
        Completion::pam(status, PamStatus::describe(status))
    }

    async fn run(&self, req: &mut PamRequest) -> AuthResult<i32> {
        if self.online.is_offline() {
            tracing::debug!("backend is marked offline, retry later");
            return Ok(PamStatus::AuthinfoUnavail.as_i32());
        }

        if !matches!(req.cmd, PamCommand::Authenticate | PamCommand::Chauthtok) {
            // Not this backend's task; report success so the front-end
            // moves on.
            tracing::debug!(cmd = ?req.cmd, "PAM task not handled here");
            return Ok(PamStatus::Success.as_i32());
        }

        self.resolve_upn(req).await?;

        let frame = protocol::encode_request(req)?;
        let raw = child::run_helper(&self.ctx.helper_path, &frame, req.uid, req.gid).await?;
        let reply = protocol::decode_reply(&raw)?;

        tracing::debug!(
            pam_status = reply.pam_status,
            msg_type = reply.msg_type,
            msg_len = reply.message.len(),
            "helper reply"
        );
        req.add_response(reply.msg_type, &reply.message);
        let status = reply.pam_status;

        if status == PamStatus::AuthinfoUnavail.as_i32() {
            self.online.mark_offline();
            return Ok(status);
        }

        if status == PamStatus::Success.as_i32() && req.cmd == PamCommand::Authenticate {
            self.append_environment(req);
        }

        if status == PamStatus::Success.as_i32() && self.domain.cache_credentials {
            self.cache_credentials(req).await;
        }

        Ok(status)
    }

    /// Resolves the user principal name, per the lookup-then-synthesize
    /// order: local store first, simple `user@REALM` fallback second.
    async fn resolve_upn(&self, req: &mut PamRequest) -> AuthResult<()> {
        let rows = self.store.get_user_attr(&req.user, &[ATTR_UPN]).await?;

        match rows.as_slice() {
            [] => {
                tracing::debug!(user = %req.user, "no principal name in the local store");
            }
            [row] => {
                req.upn = row.get(ATTR_UPN).and_then(|v| v.first()).cloned();
            }
            _ => {
                tracing::warn!(
                    user = %req.user,
                    count = rows.len(),
                    "user search returned more than one result"
                );
            }
        }

        if req.upn.is_none() && self.ctx.try_simple_upn {
            if let Some(realm) = &self.ctx.realm {
                let upn = format!("{}@{}", req.user, realm);
                tracing::debug!(%upn, "using simple principal name");
                req.upn = Some(upn);
            }
        }

        if req.upn.is_none() {
            return Err(AuthError::MissingUpn);
        }
        Ok(())
    }

    /// Appends the realm and KDC environment items for the PAM session.
    fn append_environment(&self, req: &mut PamRequest) {
        if let Some(realm) = &self.ctx.realm {
            req.add_response(
                PAM_RESPONSE_ENV_ITEM,
                format!("{ENV_REALM}={realm}").as_bytes(),
            );
        }
        if let Some(kdc) = &self.ctx.kdc_addr {
            req.add_response(PAM_RESPONSE_ENV_ITEM, format!("{ENV_KDC}={kdc}").as_bytes());
        }
    }

    /// Hands the password to the local store for offline auth.
    ///
    /// The plaintext copy lives in a wiped-on-release buffer, and cache
    /// failures never alter the reported success.
    async fn cache_credentials(&self, req: &PamRequest) {
        let token = match req.cmd {
            PamCommand::Authenticate => &req.authtok,
            PamCommand::Chauthtok => &req.newauthtok,
            _ => return,
        };
        if token.is_empty() {
            tracing::warn!(user = %req.user, "password not available, offline auth may not work");
            return;
        }

        let password = Zeroizing::new(String::from_utf8_lossy(token).into_owned());
        if let Err(e) = self.store.cache_password(&req.user, &password).await {
            tracing::warn!(error = %e, user = %req.user, "failed to cache password");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use std::time::Duration;

    use nix::unistd::{getgid, getuid};

    use authd_core::PAM_RESPONSE_ENV_ITEM;
    use authd_store::{MemoryStore, UserRecord};

    use super::*;
    use crate::config::Krb5Config;

    /// Helper stub that drains the request and replies with the given
    /// PAM status (octal escape, e.g. `\0` or `\011`) and no message.
    fn reply_script(status_octal: &str) -> String {
        format!(
            "#!/bin/sh\ncat > /dev/null\nprintf '{status_octal}\\0\\0\\0\\0\\0\\0\\0\\0\\0\\0\\0'\n"
        )
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        provider: Krb5AuthProvider,
        store: Arc<MemoryStore>,
        online: Arc<OnlineTracker>,
    }

    fn fixture(script: &str, config: Krb5Config, domain: DomainConfig) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let helper: PathBuf = dir.path().join("helper.sh");
        std::fs::write(&helper, script).unwrap();
        let mut perms = std::fs::metadata(&helper).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&helper, perms).unwrap();

        let ctx = Krb5Context::from_config(Krb5Config {
            helper_path: helper,
            ..config
        });
        let store = Arc::new(MemoryStore::new());
        let online = Arc::new(OnlineTracker::new(Duration::from_secs(300)));
        let provider = Krb5AuthProvider::new(ctx, domain, store.clone(), online.clone());

        Fixture {
            _dir: dir,
            provider,
            store,
            online,
        }
    }

    fn authenticate_request() -> PamRequest {
        let mut req = PamRequest::new(
            PamCommand::Authenticate,
            "alice",
            getuid().as_raw(),
            getgid().as_raw(),
        );
        req.set_authtok(b"hunter2");
        req
    }

    fn simple_upn_config() -> Krb5Config {
        Krb5Config {
            realm: Some("EXAMPLE.COM".to_string()),
            kdc_addr: Some("10.0.0.1".to_string()),
            try_simple_upn: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn unrelated_pam_task_reports_success() {
        let fx = fixture(
            &reply_script("\\0"),
            Krb5Config::default(),
            DomainConfig::default(),
        );
        let mut req = PamRequest::new(PamCommand::AcctMgmt, "alice", 0, 0);

        let completion = fx.provider.handle_pam(&mut req).await;

        assert_eq!(completion.status, PamStatus::Success.as_i32());
        assert!(req.responses.is_empty());
    }

    #[tokio::test]
    async fn offline_backend_reports_authinfo_unavail() {
        let fx = fixture(
            &reply_script("\\0"),
            simple_upn_config(),
            DomainConfig::default(),
        );
        fx.online.mark_offline();
        let mut req = authenticate_request();

        let completion = fx.provider.handle_pam(&mut req).await;

        assert_eq!(completion.status, PamStatus::AuthinfoUnavail.as_i32());
    }

    #[tokio::test]
    async fn missing_upn_without_fallback_is_a_system_error() {
        let fx = fixture(
            &reply_script("\\0"),
            Krb5Config::default(),
            DomainConfig::default(),
        );
        let mut req = authenticate_request();

        let completion = fx.provider.handle_pam(&mut req).await;

        assert_eq!(completion.status, PamStatus::SystemErr.as_i32());
        assert_eq!(req.pam_status, PamStatus::SystemErr.as_i32());
    }

    #[tokio::test]
    async fn simple_upn_fallback_authenticates() {
        let fx = fixture(
            &reply_script("\\0"),
            simple_upn_config(),
            DomainConfig::default(),
        );
        let mut req = authenticate_request();

        let completion = fx.provider.handle_pam(&mut req).await;

        assert_eq!(completion.status, PamStatus::Success.as_i32());
        assert_eq!(req.upn.as_deref(), Some("alice@EXAMPLE.COM"));
    }

    #[tokio::test]
    async fn stored_upn_wins_over_fallback() {
        let fx = fixture(
            &reply_script("\\0"),
            simple_upn_config(),
            DomainConfig::default(),
        );
        let mut user = UserRecord::new("alice");
        user.attrs.insert(
            ATTR_UPN.to_string(),
            vec!["alice@STORED.ORG".to_string()],
        );
        fx.store.upsert_users(vec![user]).await.unwrap();
        let mut req = authenticate_request();

        fx.provider.handle_pam(&mut req).await;

        assert_eq!(req.upn.as_deref(), Some("alice@STORED.ORG"));
    }

    #[tokio::test]
    async fn success_appends_realm_and_kdc_env_items() {
        let fx = fixture(
            &reply_script("\\0"),
            simple_upn_config(),
            DomainConfig::default(),
        );
        let mut req = authenticate_request();

        fx.provider.handle_pam(&mut req).await;

        let env_items: Vec<&[u8]> = req
            .responses
            .iter()
            .filter(|r| r.kind == PAM_RESPONSE_ENV_ITEM)
            .map(|r| r.data.as_slice())
            .collect();
        assert!(env_items.contains(&b"SSSD_REALM=EXAMPLE.COM".as_slice()));
        assert!(env_items.contains(&b"SSSD_KDC=10.0.0.1".as_slice()));
    }

    #[tokio::test]
    async fn success_with_caching_stores_a_hash() {
        let fx = fixture(
            &reply_script("\\0"),
            simple_upn_config(),
            DomainConfig {
                cache_credentials: true,
                ..Default::default()
            },
        );
        let mut req = authenticate_request();

        let completion = fx.provider.handle_pam(&mut req).await;

        assert_eq!(completion.status, PamStatus::Success.as_i32());
        assert!(fx.store.verify_cached_password("alice", "hunter2"));
    }

    #[tokio::test]
    async fn helper_unavailable_status_marks_offline() {
        // PAM_AUTHINFO_UNAVAIL = 9 = octal 011.
        let fx = fixture(
            &reply_script("\\011"),
            simple_upn_config(),
            DomainConfig::default(),
        );
        let mut req = authenticate_request();

        let completion = fx.provider.handle_pam(&mut req).await;

        assert_eq!(completion.status, PamStatus::AuthinfoUnavail.as_i32());
        assert!(fx.online.is_offline());
    }

    #[tokio::test]
    async fn garbage_reply_is_a_system_error() {
        let fx = fixture(
            "#!/bin/sh\ncat > /dev/null\nprintf 'garbage'\n",
            simple_upn_config(),
            DomainConfig::default(),
        );
        let mut req = authenticate_request();

        let completion = fx.provider.handle_pam(&mut req).await;

        assert_eq!(completion.status, PamStatus::SystemErr.as_i32());
    }
}
