//! Backend assembly and front-end dispatch.

use std::sync::Arc;

use authd_core::{
    AccountRequest, Completion, OnlineStatus, OnlineTracker, PamRequest, Reply, Request,
    RequestTarget,
};
use authd_provider_krb5::{Krb5AuthProvider, Krb5Context};
use authd_provider_ldap::directory::Directory;
use authd_provider_ldap::enumerate::EnumerationHandle;
use authd_provider_ldap::LdapIdProvider;
use authd_store::IdentityStore;

use crate::config::BackendConfig;
use crate::error::InitResult;

/// The assembled backend for one domain.
///
/// Owns both providers and the enumeration task; the front-end router
/// holds it behind an `Arc` and feeds it [`Request`]s.
pub struct Backend {
    id: LdapIdProvider,
    auth: Krb5AuthProvider,
    online: Arc<OnlineTracker>,
    enumeration: tokio::sync::Mutex<Option<EnumerationHandle>>,
}

impl Backend {
    /// Initializes the backend with the production directory adapter.
    ///
    /// Validates the configuration (unknown TLS policies and broken
    /// attribute maps are fatal), exports the helper environment,
    /// installs both providers around one shared online tracker, and
    /// schedules an immediate first enumeration when the domain enables
    /// it.
    pub fn init(config: BackendConfig, store: Arc<dyn IdentityStore>) -> InitResult<Self> {
        config.ldap.validate()?;
        let online = Arc::new(OnlineTracker::new(config.ldap.offline_window()));
        let id = LdapIdProvider::new(config.ldap, store.clone(), online.clone())?;
        Self::assemble(config.domain, config.krb5, id, store, online)
    }

    /// Initializes the backend over an arbitrary directory implementation.
    ///
    /// Used by tests and by deployments that bring their own codec.
    pub fn init_with_directory(
        config: BackendConfig,
        store: Arc<dyn IdentityStore>,
        directory: Arc<dyn Directory>,
    ) -> InitResult<Self> {
        config.ldap.validate()?;
        let online = Arc::new(OnlineTracker::new(config.ldap.offline_window()));
        let id =
            LdapIdProvider::with_directory(Arc::new(config.ldap.clone()), directory, online.clone());
        Self::assemble(config.domain, config.krb5, id, store, online)
    }

    fn assemble(
        domain: authd_core::DomainConfig,
        krb5: authd_provider_krb5::Krb5Config,
        id: LdapIdProvider,
        store: Arc<dyn IdentityStore>,
        online: Arc<OnlineTracker>,
    ) -> InitResult<Self> {
        let ctx = Krb5Context::from_config(krb5);
        ctx.export_environment();
        let auth = Krb5AuthProvider::new(ctx, domain.clone(), store, online.clone());

        let enumeration = id.spawn_enumeration(&domain);
        tracing::info!(
            domain = %domain.name,
            enumerate = domain.enumerate,
            cache_credentials = domain.cache_credentials,
            "backend initialized"
        );

        Ok(Self {
            id,
            auth,
            online,
            enumeration: tokio::sync::Mutex::new(enumeration),
        })
    }

    /// The shared online tracker.
    #[must_use]
    pub fn online(&self) -> Arc<OnlineTracker> {
        self.online.clone()
    }

    /// Current reachability, for the front-end's `check_online` target.
    #[must_use]
    pub fn check_online(&self) -> OnlineStatus {
        self.id.check_online()
    }

    /// Handles one account-information request.
    pub async fn handle_account_info(&self, req: &AccountRequest) -> Completion {
        self.id.handle_account_info(req).await
    }

    /// Handles one PAM task.
    pub async fn handle_pam(&self, req: &mut PamRequest) -> Completion {
        self.auth.handle_pam(req).await
    }

    /// Routes a front-end request to its handler on a fresh task.
    ///
    /// The responder guarantees exactly one reply even if the task dies.
    pub fn dispatch(self: &Arc<Self>, request: Request) {
        let backend = self.clone();
        tokio::spawn(async move {
            let Request { target, responder } = request;
            match target {
                RequestTarget::CheckOnline => {
                    responder.send(Reply::Online(backend.check_online()));
                }
                RequestTarget::AccountInfo(req) => {
                    let completion = backend.handle_account_info(&req).await;
                    responder.send(Reply::Account(completion));
                }
                RequestTarget::Pam(mut req) => {
                    let completion = backend.handle_pam(&mut req).await;
                    responder.send(Reply::Pam {
                        request: req,
                        completion,
                    });
                }
            }
        });
    }

    /// Stops the enumeration task and closes the directory session.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.enumeration.lock().await.take() {
            handle.shutdown().await;
        }
        self.id.shutdown().await;
        tracing::info!("backend shut down");
    }
}
