//! Account-information dispatcher.
//!
//! Routes user, group and initgroups lookups over the shared directory
//! session, lazily (re)establishing it through the connection manager.

use std::sync::Arc;

use authd_core::{
    AccountRequest, AttrType, Completion, EntryType, FilterType, OnlineStatus, OnlineTracker,
};

use crate::attrmap::AttributeMap;
use crate::config::{ldap_escape, LdapProviderConfig};
use crate::connection::ConnectionManager;
use crate::directory::DirectorySession;
use crate::error::{IdError, IdResult};

/// Routes account lookups; one per provider.
pub struct IdDispatcher {
    config: Arc<LdapProviderConfig>,
    connections: Arc<ConnectionManager>,
    online: Arc<OnlineTracker>,
}

impl IdDispatcher {
    /// Creates the dispatcher.
    #[must_use]
    pub fn new(
        config: Arc<LdapProviderConfig>,
        connections: Arc<ConnectionManager>,
        online: Arc<OnlineTracker>,
    ) -> Self {
        Self {
            config,
            connections,
            online,
        }
    }

    /// Current reachability, for the front-end's `check_online` target.
    #[must_use]
    pub fn check_online(&self) -> OnlineStatus {
        self.online.status()
    }

    /// Handles one account-information request.
    ///
    /// Never returns an error: failures are mapped onto the front-end
    /// completion contract, and transport failures mark the backend
    /// offline on the way out.
    pub async fn handle_account_info(&self, req: &AccountRequest) -> Completion {
        if self.online.is_offline() {
            return Completion::retry_later("Offline");
        }

        match self.dispatch(req).await {
            Ok(completion) => completion,
            Err(err) => {
                if err.is_transport() {
                    self.online.mark_offline();
                }
                tracing::debug!(error = %err, ?req.entry_type, "account request failed");
                err.completion()
            }
        }
    }

    async fn dispatch(&self, req: &AccountRequest) -> IdResult<Completion> {
        match req.entry_type {
            EntryType::User => {
                // Enumeration on demand is refused; the scheduler owns it.
                if req.filter_value == "*" {
                    return Ok(Completion::ok());
                }
                let filter = lookup_filter(&self.config.user_map, req)?;
                let attrs = self.config.user_map.request_attrs();
                let session = self.connect().await?;
                session.search_users(&filter, &attrs).await?;
            }
            EntryType::Group => {
                if req.filter_value == "*" {
                    return Ok(Completion::ok());
                }
                let filter = lookup_filter(&self.config.group_map, req)?;
                let attrs = self.config.group_map.request_attrs();
                let session = self.connect().await?;
                session.search_groups(&filter, &attrs).await?;
            }
            EntryType::Initgroups => {
                validate_initgroups(req)?;
                let attrs = self.config.group_map.request_attrs();
                let session = self.connect().await?;
                session.initgroups(&req.filter_value, &attrs).await?;
            }
        }

        Ok(Completion::ok())
    }

    async fn connect(&self) -> IdResult<Arc<dyn DirectorySession>> {
        self.connections.ensure_connected().await
    }
}

/// Builds the server-side lookup filter for a user or group request.
pub(crate) fn lookup_filter(map: &AttributeMap, req: &AccountRequest) -> IdResult<String> {
    let attr = match req.filter_type {
        FilterType::Name => map.name.as_str(),
        FilterType::IdNum => map
            .id
            .as_deref()
            .ok_or(IdError::InvalidRequest("No id attribute mapped"))?,
    };

    Ok(format!(
        "(&({}={})(objectclass={}))",
        attr,
        ldap_escape(&req.filter_value),
        map.object_class
    ))
}

/// Validates an initgroups request payload.
pub(crate) fn validate_initgroups(req: &AccountRequest) -> IdResult<()> {
    if req.filter_type != FilterType::Name {
        return Err(IdError::InvalidRequest("Invalid filter type"));
    }
    if req.attr_type != AttrType::Core {
        return Err(IdError::InvalidRequest("Invalid attr type"));
    }
    if req.filter_value.contains('*') {
        return Err(IdError::InvalidRequest("Invalid filter value"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::directory::{ConnectOptions, Directory};

    struct RecordingSession {
        searches: AtomicUsize,
    }

    #[async_trait]
    impl DirectorySession for RecordingSession {
        fn connected(&self) -> bool {
            true
        }

        async fn search_users(&self, _: &str, _: &[String]) -> IdResult<Option<String>> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn search_groups(&self, _: &str, _: &[String]) -> IdResult<Option<String>> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn initgroups(&self, _: &str, _: &[String]) -> IdResult<()> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&self) {}
    }

    struct RecordingDirectory {
        connects: AtomicUsize,
        session: Arc<RecordingSession>,
        fail_bind: AtomicBool,
    }

    impl RecordingDirectory {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                connects: AtomicUsize::new(0),
                session: Arc::new(RecordingSession {
                    searches: AtomicUsize::new(0),
                }),
                fail_bind: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl Directory for RecordingDirectory {
        async fn connect(
            &self,
            _opts: ConnectOptions<'_>,
        ) -> IdResult<Arc<dyn DirectorySession>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.fail_bind.load(Ordering::SeqCst) {
                return Err(IdError::BindFailed("invalid credentials".into()));
            }
            Ok(self.session.clone())
        }
    }

    fn dispatcher(
        directory: Arc<RecordingDirectory>,
        offline_timeout: Duration,
    ) -> (IdDispatcher, Arc<OnlineTracker>) {
        let config = Arc::new(LdapProviderConfig::default());
        let online = Arc::new(OnlineTracker::new(offline_timeout));
        let connections = Arc::new(ConnectionManager::new(config.clone(), directory));
        (
            IdDispatcher::new(config, connections, online.clone()),
            online,
        )
    }

    #[tokio::test]
    async fn offline_short_circuits_without_network() {
        let directory = RecordingDirectory::new();
        let (dispatcher, online) = dispatcher(directory.clone(), Duration::from_secs(300));
        online.mark_offline();

        let req = AccountRequest::by_name(EntryType::User, "alice");
        let completion = dispatcher.handle_account_info(&req).await;

        assert_eq!(completion.status, libc::EAGAIN);
        assert_eq!(completion.message, "Offline");
        assert_eq!(directory.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn wildcard_lookup_is_a_noop() {
        let directory = RecordingDirectory::new();
        let (dispatcher, _) = dispatcher(directory.clone(), Duration::from_secs(300));

        let req = AccountRequest::by_name(EntryType::User, "*");
        let completion = dispatcher.handle_account_info(&req).await;

        assert!(completion.is_ok());
        assert_eq!(completion.message, "Success");
        assert_eq!(directory.connects.load(Ordering::SeqCst), 0);
        assert_eq!(directory.session.searches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn initgroups_rejects_wildcard_value() {
        let directory = RecordingDirectory::new();
        let (dispatcher, _) = dispatcher(directory.clone(), Duration::from_secs(300));

        let req = AccountRequest::by_name(EntryType::Initgroups, "ali*e");
        let completion = dispatcher.handle_account_info(&req).await;

        assert_eq!(completion.status, libc::EINVAL);
        assert_eq!(completion.message, "Invalid filter value");
        assert_eq!(directory.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn initgroups_rejects_idnum_filter() {
        let directory = RecordingDirectory::new();
        let (dispatcher, _) = dispatcher(directory, Duration::from_secs(300));

        let req = AccountRequest::by_id(EntryType::Initgroups, 1000);
        let completion = dispatcher.handle_account_info(&req).await;

        assert_eq!(completion.status, libc::EINVAL);
        assert_eq!(completion.message, "Invalid filter type");
    }

    #[tokio::test]
    async fn bind_failure_reports_eacces_and_marks_offline() {
        let directory = RecordingDirectory::new();
        directory.fail_bind.store(true, Ordering::SeqCst);
        let (dispatcher, online) = dispatcher(directory, Duration::from_secs(300));

        let req = AccountRequest::by_id(EntryType::User, 1000);
        let completion = dispatcher.handle_account_info(&req).await;

        assert_eq!(completion.status, libc::EACCES);
        assert!(online.is_offline());
    }

    #[tokio::test]
    async fn lookup_reaches_the_session() {
        let directory = RecordingDirectory::new();
        let (dispatcher, _) = dispatcher(directory.clone(), Duration::from_secs(300));

        let req = AccountRequest::by_name(EntryType::User, "alice");
        let completion = dispatcher.handle_account_info(&req).await;

        assert!(completion.is_ok());
        assert_eq!(directory.session.searches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn user_filter_by_name() {
        let map = AttributeMap::users_rfc2307();
        let req = AccountRequest::by_name(EntryType::User, "alice");
        assert_eq!(
            lookup_filter(&map, &req).unwrap(),
            "(&(uid=alice)(objectclass=posixAccount))"
        );
    }

    #[test]
    fn user_filter_by_uid() {
        let map = AttributeMap::users_rfc2307();
        let req = AccountRequest::by_id(EntryType::User, 1000);
        assert_eq!(
            lookup_filter(&map, &req).unwrap(),
            "(&(uidNumber=1000)(objectclass=posixAccount))"
        );
    }

    #[test]
    fn group_filter_by_name() {
        let map = AttributeMap::groups_rfc2307();
        let req = AccountRequest::by_name(EntryType::Group, "wheel");
        assert_eq!(
            lookup_filter(&map, &req).unwrap(),
            "(&(cn=wheel)(objectclass=posixGroup))"
        );
    }

    #[test]
    fn filter_values_are_escaped() {
        let map = AttributeMap::users_rfc2307();
        let req = AccountRequest::by_name(EntryType::User, "ali(ce)");
        assert_eq!(
            lookup_filter(&map, &req).unwrap(),
            "(&(uid=ali\\28ce\\29)(objectclass=posixAccount))"
        );
    }
}
