//! In-memory reference store.
//!
//! Backs the daemon shell when no on-disk store is wired in, and every
//! test that needs a store. Cached credentials are salted Argon2id hashes
//! in PHC string format.

use std::collections::HashMap;
use std::sync::RwLock;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{StoreError, StoreResult};
use crate::provider::IdentityStore;
use crate::record::{AttrRow, GroupRecord, UserRecord};

/// A cached offline credential.
#[derive(Debug, Clone)]
struct CachedCredential {
    /// PHC-formatted Argon2id hash.
    hash: String,

    /// When the credential was cached.
    cached_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<String, UserRecord>,
    groups: HashMap<String, GroupRecord>,
    initgroups: HashMap<String, Vec<String>>,
    credentials: HashMap<String, CachedCredential>,
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of user records currently held.
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.inner.read().expect("store lock poisoned").users.len()
    }

    /// Number of group records currently held.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.inner.read().expect("store lock poisoned").groups.len()
    }

    /// Cached group membership of a user, if any.
    #[must_use]
    pub fn initgroups_of(&self, user: &str) -> Option<Vec<String>> {
        self.inner
            .read()
            .expect("store lock poisoned")
            .initgroups
            .get(user)
            .cloned()
    }

    /// Whether a cached credential exists for the user.
    #[must_use]
    pub fn has_cached_password(&self, user: &str) -> bool {
        self.inner
            .read()
            .expect("store lock poisoned")
            .credentials
            .contains_key(user)
    }

    /// Verifies a password against the cached hash.
    ///
    /// Used by the offline-auth path and by tests; returns `false` both
    /// for a wrong password and for a user with no cached credential.
    #[must_use]
    pub fn verify_cached_password(&self, user: &str, password: &str) -> bool {
        let inner = self.inner.read().expect("store lock poisoned");
        let Some(cred) = inner.credentials.get(user) else {
            return false;
        };
        let Ok(parsed) = PasswordHash::new(&cred.hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// When the user's credential was cached, if it was.
    #[must_use]
    pub fn password_cached_at(&self, user: &str) -> Option<DateTime<Utc>> {
        self.inner
            .read()
            .expect("store lock poisoned")
            .credentials
            .get(user)
            .map(|c| c.cached_at)
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn get_user_attr(&self, user: &str, attrs: &[&str]) -> StoreResult<Vec<AttrRow>> {
        let inner = self.inner.read().expect("store lock poisoned");
        let Some(record) = inner.users.get(user) else {
            return Ok(Vec::new());
        };

        let mut row = AttrRow::new();
        for attr in attrs {
            if let Some(values) = record.attrs.get(*attr) {
                row.insert((*attr).to_string(), values.clone());
            }
        }
        Ok(vec![row])
    }

    async fn upsert_users(&self, users: Vec<UserRecord>) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        for user in users {
            inner.users.insert(user.name.clone(), user);
        }
        Ok(())
    }

    async fn upsert_groups(&self, groups: Vec<GroupRecord>) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        for group in groups {
            inner.groups.insert(group.name.clone(), group);
        }
        Ok(())
    }

    async fn set_initgroups(&self, user: &str, groups: Vec<String>) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.initgroups.insert(user.to_string(), groups);
        Ok(())
    }

    async fn cache_password(&self, user: &str, password: &str) -> StoreResult<()> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| StoreError::hash(e.to_string()))?
            .to_string();

        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.credentials.insert(
            user.to_string(),
            CachedCredential {
                hash,
                cached_at: Utc::now(),
            },
        );

        tracing::debug!(user, "cached offline credential");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_and_read_attrs() {
        let store = MemoryStore::new();
        let mut user = UserRecord::new("alice");
        user.attrs.insert(
            crate::ATTR_UPN.to_string(),
            vec!["alice@EXAMPLE.COM".to_string()],
        );
        store.upsert_users(vec![user]).await.unwrap();

        let rows = store
            .get_user_attr("alice", &[crate::ATTR_UPN])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].get(crate::ATTR_UPN).unwrap(),
            &vec!["alice@EXAMPLE.COM".to_string()]
        );
    }

    #[tokio::test]
    async fn unknown_user_yields_zero_rows() {
        let store = MemoryStore::new();
        let rows = store.get_user_attr("ghost", &[crate::ATTR_UPN]).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn cached_password_is_salted_hash() {
        let store = MemoryStore::new();
        store.cache_password("alice", "hunter2").await.unwrap();

        assert!(store.has_cached_password("alice"));
        assert!(store.verify_cached_password("alice", "hunter2"));
        assert!(!store.verify_cached_password("alice", "wrong"));
        assert!(!store.verify_cached_password("bob", "hunter2"));
    }

    #[tokio::test]
    async fn initgroups_are_replaced() {
        let store = MemoryStore::new();
        store
            .set_initgroups("alice", vec!["wheel".to_string(), "audio".to_string()])
            .await
            .unwrap();
        store
            .set_initgroups("alice", vec!["wheel".to_string()])
            .await
            .unwrap();

        assert_eq!(store.initgroups_of("alice").unwrap(), vec!["wheel"]);
    }
}
