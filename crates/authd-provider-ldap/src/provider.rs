//! Provider assembly.

use std::sync::Arc;

use authd_core::{AccountRequest, Completion, DomainConfig, OnlineStatus, OnlineTracker};
use authd_store::IdentityStore;

use crate::config::LdapProviderConfig;
use crate::connection::ConnectionManager;
use crate::directory::{Directory, LdapDirectory};
use crate::enumerate::{EnumerationHandle, EnumerationScheduler};
use crate::error::IdResult;
use crate::id::IdDispatcher;

/// The assembled LDAP identity provider.
///
/// Owns the connection manager and dispatcher; the online tracker is
/// shared with the auth provider. The enumeration task is spawned
/// separately so the caller controls its lifetime.
pub struct LdapIdProvider {
    config: Arc<LdapProviderConfig>,
    connections: Arc<ConnectionManager>,
    online: Arc<OnlineTracker>,
    dispatcher: IdDispatcher,
}

impl LdapIdProvider {
    /// Creates the provider with the production `ldap3` directory adapter.
    ///
    /// ## Errors
    ///
    /// Fails on invalid configuration.
    pub fn new(
        config: LdapProviderConfig,
        store: Arc<dyn IdentityStore>,
        online: Arc<OnlineTracker>,
    ) -> IdResult<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let directory = Arc::new(LdapDirectory::new(config.clone(), store));
        Ok(Self::with_directory(config, directory, online))
    }

    /// Creates the provider over an arbitrary directory implementation.
    ///
    /// Used by tests and by deployments that bring their own codec.
    #[must_use]
    pub fn with_directory(
        config: Arc<LdapProviderConfig>,
        directory: Arc<dyn Directory>,
        online: Arc<OnlineTracker>,
    ) -> Self {
        let connections = Arc::new(ConnectionManager::new(config.clone(), directory));
        let dispatcher =
            IdDispatcher::new(config.clone(), connections.clone(), online.clone());
        Self {
            config,
            connections,
            online,
            dispatcher,
        }
    }

    /// The provider configuration.
    #[must_use]
    pub fn config(&self) -> &LdapProviderConfig {
        &self.config
    }

    /// The shared online tracker.
    #[must_use]
    pub fn online(&self) -> Arc<OnlineTracker> {
        self.online.clone()
    }

    /// Current reachability, for the front-end's `check_online` target.
    #[must_use]
    pub fn check_online(&self) -> OnlineStatus {
        self.dispatcher.check_online()
    }

    /// Handles one account-information request.
    pub async fn handle_account_info(&self, req: &AccountRequest) -> Completion {
        self.dispatcher.handle_account_info(req).await
    }

    /// Builds the enumeration scheduler for this provider.
    #[must_use]
    pub fn enumeration_scheduler(&self) -> Arc<EnumerationScheduler> {
        Arc::new(EnumerationScheduler::new(
            self.config.clone(),
            self.connections.clone(),
            self.online.clone(),
        ))
    }

    /// Spawns the periodic enumeration task when the domain enables it.
    ///
    /// The first cycle fires immediately.
    #[must_use]
    pub fn spawn_enumeration(&self, domain: &DomainConfig) -> Option<EnumerationHandle> {
        if !domain.enumerate {
            return None;
        }
        tracing::info!(domain = %domain.name, "starting directory enumeration task");
        Some(self.enumeration_scheduler().spawn())
    }

    /// Closes the directory session.
    pub async fn shutdown(&self) {
        self.connections.shutdown().await;
    }
}
