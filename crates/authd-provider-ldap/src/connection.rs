//! Shared directory session management.
//!
//! At most one directory session exists per provider. All concurrent ID
//! operations share it; the manager only controls its lifecycle.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::LdapProviderConfig;
use crate::directory::{ConnectOptions, Directory, DirectorySession};
use crate::error::IdResult;

/// Owns the at-most-one shared directory session.
///
/// `ensure_connected` is single-flight: the session slot's lock is held
/// across the connect+bind, so a second caller arriving while an attempt
/// is in flight queues on the lock and then observes the installed
/// session instead of starting its own attempt.
pub struct ConnectionManager {
    config: Arc<LdapProviderConfig>,
    directory: Arc<dyn Directory>,
    session: Mutex<Option<Arc<dyn DirectorySession>>>,
}

impl ConnectionManager {
    /// Creates a manager with no session.
    #[must_use]
    pub fn new(config: Arc<LdapProviderConfig>, directory: Arc<dyn Directory>) -> Self {
        Self {
            config,
            directory,
            session: Mutex::new(None),
        }
    }

    /// Returns the shared session, establishing it if needed.
    ///
    /// A stale (no longer connected) session is released before the
    /// reconnect. On failure the caller is expected to mark the backend
    /// offline.
    pub async fn ensure_connected(&self) -> IdResult<Arc<dyn DirectorySession>> {
        let mut slot = self.session.lock().await;

        if let Some(session) = slot.as_ref() {
            if session.connected() {
                return Ok(session.clone());
            }
        }

        if let Some(stale) = slot.take() {
            tracing::debug!("dropping stale directory session");
            stale.close().await;
        }

        let opts = ConnectOptions {
            use_starttls: self.config.use_starttls,
            bind_dn: self.config.default_bind_dn.as_deref(),
            authtok_type: self.config.default_authtok_type.as_deref(),
            authtok: self.config.default_authtok.as_deref(),
        };
        let session = self.directory.connect(opts).await?;
        *slot = Some(session.clone());
        Ok(session)
    }

    /// Drops the current session, if any.
    pub async fn invalidate(&self) {
        if let Some(session) = self.session.lock().await.take() {
            session.close().await;
        }
    }

    /// Closes the session at shutdown.
    pub async fn shutdown(&self) {
        self.invalidate().await;
    }
}
