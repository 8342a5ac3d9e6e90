//! The seam to the directory codec.
//!
//! The backend treats the low-level protocol (bind, search, paging) as an
//! external collaborator, so the dispatcher and the enumeration scheduler
//! talk to [`Directory`] / [`DirectorySession`] trait objects. The
//! production adapter here drives `ldap3`; tests script their own.
//!
//! Search operations persist their results into the local store and
//! report the highest modification timestamp they saw, which feeds the
//! enumeration watermarks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};

use authd_store::{GroupRecord, IdentityStore, UserRecord};

use crate::attrmap::AttributeMap;
use crate::config::{ldap_escape, LdapProviderConfig};
use crate::error::{IdError, IdResult};

// ============================================================================
// Seam traits
// ============================================================================

/// Connection parameters for one connect+bind attempt.
#[derive(Debug, Clone, Copy)]
pub struct ConnectOptions<'a> {
    /// Upgrade the transport with STARTTLS before binding.
    pub use_starttls: bool,

    /// DN to bind as; anonymous when unset.
    pub bind_dn: Option<&'a str>,

    /// Credential type; only `password` is supported.
    pub authtok_type: Option<&'a str>,

    /// Bind credential.
    pub authtok: Option<&'a str>,
}

/// Factory for directory sessions.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Opens the transport, optionally upgrades it, and binds.
    ///
    /// A session returned from here is always bound; unbound sessions are
    /// never exposed.
    async fn connect(&self, opts: ConnectOptions<'_>) -> IdResult<Arc<dyn DirectorySession>>;
}

/// One bound session, shared by all concurrent ID operations.
///
/// Operations take `&self`: serialization over the wire is the codec's
/// problem, and `ldap3` multiplexes concurrent operations over one
/// connection.
#[async_trait]
pub trait DirectorySession: Send + Sync {
    /// Whether the session is still usable. Cleared on fatal I/O; the
    /// connection manager observes this and drops the session before
    /// reconnecting.
    fn connected(&self) -> bool;

    /// Searches user entries, persists them, and returns the highest
    /// modification timestamp among the results.
    async fn search_users(&self, filter: &str, attrs: &[String]) -> IdResult<Option<String>>;

    /// Searches group entries, persists them, and returns the highest
    /// modification timestamp among the results.
    async fn search_groups(&self, filter: &str, attrs: &[String]) -> IdResult<Option<String>>;

    /// Resolves and persists the groups the named user is a member of.
    async fn initgroups(&self, name: &str, attrs: &[String]) -> IdResult<()>;

    /// Unbinds and releases the session.
    async fn close(&self);
}

// ============================================================================
// ldap3 adapter
// ============================================================================

/// Production [`Directory`] implementation over `ldap3`.
pub struct LdapDirectory {
    config: Arc<LdapProviderConfig>,
    store: Arc<dyn IdentityStore>,
}

impl LdapDirectory {
    /// Creates the adapter.
    #[must_use]
    pub fn new(config: Arc<LdapProviderConfig>, store: Arc<dyn IdentityStore>) -> Self {
        Self { config, store }
    }
}

#[async_trait]
impl Directory for LdapDirectory {
    async fn connect(&self, opts: ConnectOptions<'_>) -> IdResult<Arc<dyn DirectorySession>> {
        let mut settings = LdapConnSettings::new().set_conn_timeout(self.config.connect_timeout());
        if opts.use_starttls {
            settings = settings.set_starttls(true);
        }
        if !self.config.tls_reqcert.verifies_peer() {
            settings = settings.set_no_tls_verify(true);
        }

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &self.config.uri)
            .await
            .map_err(|e| IdError::ConnectFailed(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                tracing::warn!(error = %e, "directory connection driver terminated");
            }
        });

        match opts.authtok_type {
            None | Some("password") => {}
            Some(other) => {
                return Err(IdError::BindFailed(format!(
                    "unsupported authtok type: {other}"
                )));
            }
        }

        ldap.simple_bind(opts.bind_dn.unwrap_or(""), opts.authtok.unwrap_or(""))
            .await
            .map_err(|e| IdError::BindFailed(e.to_string()))?
            .success()
            .map_err(|e| IdError::BindFailed(e.to_string()))?;

        tracing::debug!(uri = %self.config.uri, "directory session bound");

        Ok(Arc::new(LdapSession {
            ldap,
            config: self.config.clone(),
            store: self.store.clone(),
            connected: AtomicBool::new(true),
        }))
    }
}

/// A bound `ldap3` session.
struct LdapSession {
    ldap: Ldap,
    config: Arc<LdapProviderConfig>,
    store: Arc<dyn IdentityStore>,
    connected: AtomicBool,
}

impl LdapSession {
    /// Runs one search and parses the entries.
    async fn search(&self, filter: &str, attrs: &[String]) -> IdResult<Vec<SearchEntry>> {
        let mut ldap = self.ldap.clone();
        let (results, _res) = ldap
            .search(&self.config.search_base, Scope::Subtree, filter, attrs.to_vec())
            .await
            .map_err(|e| self.map_ldap_err(e))?
            .success()
            .map_err(|e| self.map_ldap_err(e))?;

        Ok(results.into_iter().map(SearchEntry::construct).collect())
    }

    /// Classifies an `ldap3` error: transport failures poison the session
    /// and flip the tracker; result-code failures after a good bind are
    /// plain directory errors.
    fn map_ldap_err(&self, e: ldap3::LdapError) -> IdError {
        match e {
            ldap3::LdapError::Io { .. } | ldap3::LdapError::EndOfStream => {
                self.connected.store(false, Ordering::SeqCst);
                IdError::NotConnected(e.to_string())
            }
            other => IdError::Directory(other.to_string()),
        }
    }
}

#[async_trait]
impl DirectorySession for LdapSession {
    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn search_users(&self, filter: &str, attrs: &[String]) -> IdResult<Option<String>> {
        let entries = self.search(filter, attrs).await?;

        let mut max_modstamp: Option<String> = None;
        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            let record = parse_user(&self.config.user_map, entry.attrs);
            bump_modstamp(&mut max_modstamp, record.modstamp.as_deref());
            records.push(record);
        }

        tracing::debug!(count = records.len(), "persisting user entries");
        self.store.upsert_users(records).await?;
        Ok(max_modstamp)
    }

    async fn search_groups(&self, filter: &str, attrs: &[String]) -> IdResult<Option<String>> {
        let entries = self.search(filter, attrs).await?;

        let mut max_modstamp: Option<String> = None;
        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            let record = parse_group(&self.config.group_map, entry.attrs);
            bump_modstamp(&mut max_modstamp, record.modstamp.as_deref());
            records.push(record);
        }

        tracing::debug!(count = records.len(), "persisting group entries");
        self.store.upsert_groups(records).await?;
        Ok(max_modstamp)
    }

    async fn initgroups(&self, name: &str, attrs: &[String]) -> IdResult<()> {
        let map = &self.config.group_map;
        let member_attr = map.member.as_deref().unwrap_or("memberUid");
        let filter = format!(
            "(&(objectclass={})({}={}))",
            map.object_class,
            member_attr,
            ldap_escape(name)
        );

        let entries = self.search(&filter, attrs).await?;

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            records.push(parse_group(map, entry.attrs));
        }
        let groups: Vec<String> = records.iter().map(|g| g.name.clone()).collect();

        self.store.upsert_groups(records).await?;
        self.store.set_initgroups(name, groups).await?;
        Ok(())
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let mut ldap = self.ldap.clone();
        if let Err(e) = ldap.unbind().await {
            tracing::debug!(error = %e, "unbind on session close failed");
        }
    }
}

// ============================================================================
// Entry parsing
// ============================================================================

fn first_value(attrs: &HashMap<String, Vec<String>>, name: &str) -> Option<String> {
    attrs.get(name).and_then(|v| v.first()).cloned()
}

/// Parses a user entry using the configured attribute map.
pub(crate) fn parse_user(map: &AttributeMap, attrs: HashMap<String, Vec<String>>) -> UserRecord {
    let name = first_value(&attrs, &map.name).unwrap_or_default();
    let uid = map
        .id
        .as_deref()
        .and_then(|a| first_value(&attrs, a))
        .and_then(|v| v.parse().ok());
    let modstamp = map.modstamp.as_deref().and_then(|a| first_value(&attrs, a));

    UserRecord {
        name,
        uid,
        modstamp,
        attrs,
    }
}

/// Parses a group entry using the configured attribute map.
pub(crate) fn parse_group(map: &AttributeMap, attrs: HashMap<String, Vec<String>>) -> GroupRecord {
    let name = first_value(&attrs, &map.name).unwrap_or_default();
    let gid = map
        .id
        .as_deref()
        .and_then(|a| first_value(&attrs, a))
        .and_then(|v| v.parse().ok());
    let modstamp = map.modstamp.as_deref().and_then(|a| first_value(&attrs, a));
    let members = map
        .member
        .as_deref()
        .and_then(|a| attrs.get(a).cloned())
        .unwrap_or_default();

    GroupRecord {
        name,
        gid,
        modstamp,
        members,
        attrs,
    }
}

/// Keeps the running maximum of the modification timestamps seen.
///
/// GeneralizedTime strings order correctly under byte comparison.
pub(crate) fn bump_modstamp(current: &mut Option<String>, seen: Option<&str>) {
    if let Some(ts) = seen {
        if current.as_deref().is_none_or(|cur| ts > cur) {
            *current = Some(ts.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_attrs(name: &str, uid: &str, modstamp: &str) -> HashMap<String, Vec<String>> {
        let mut attrs = HashMap::new();
        attrs.insert("uid".to_string(), vec![name.to_string()]);
        attrs.insert("uidNumber".to_string(), vec![uid.to_string()]);
        attrs.insert("modifyTimestamp".to_string(), vec![modstamp.to_string()]);
        attrs
    }

    #[test]
    fn parse_user_core_fields() {
        let map = AttributeMap::users_rfc2307();
        let record = parse_user(&map, user_attrs("alice", "1000", "20240101000000Z"));

        assert_eq!(record.name, "alice");
        assert_eq!(record.uid, Some(1000));
        assert_eq!(record.modstamp.as_deref(), Some("20240101000000Z"));
    }

    #[test]
    fn parse_user_tolerates_missing_attrs() {
        let map = AttributeMap::users_rfc2307();
        let record = parse_user(&map, HashMap::new());

        assert_eq!(record.name, "");
        assert_eq!(record.uid, None);
        assert_eq!(record.modstamp, None);
    }

    #[test]
    fn parse_group_members() {
        let map = AttributeMap::groups_rfc2307();
        let mut attrs = HashMap::new();
        attrs.insert("cn".to_string(), vec!["wheel".to_string()]);
        attrs.insert("gidNumber".to_string(), vec!["10".to_string()]);
        attrs.insert(
            "memberUid".to_string(),
            vec!["alice".to_string(), "bob".to_string()],
        );

        let record = parse_group(&map, attrs);
        assert_eq!(record.name, "wheel");
        assert_eq!(record.gid, Some(10));
        assert_eq!(record.members, vec!["alice", "bob"]);
    }

    #[test]
    fn modstamp_keeps_maximum() {
        let mut max = None;
        bump_modstamp(&mut max, Some("20240101000000Z"));
        bump_modstamp(&mut max, Some("20240102000000Z"));
        bump_modstamp(&mut max, Some("20231231000000Z"));

        assert_eq!(max.as_deref(), Some("20240102000000Z"));
    }

    #[test]
    fn modstamp_ignores_none() {
        let mut max = Some("20240101000000Z".to_string());
        bump_modstamp(&mut max, None);
        assert_eq!(max.as_deref(), Some("20240101000000Z"));
    }
}
