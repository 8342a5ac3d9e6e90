//! Local-store provider trait.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::record::{AttrRow, GroupRecord, UserRecord};

/// The store operations the backend depends on.
///
/// Implementations must be thread-safe and support concurrent access.
///
/// ## Security Note
///
/// `cache_password` receives the plaintext token; implementations must
/// salt and hash before persisting and must never log it.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Reads the requested attributes of a user record.
    ///
    /// Returns one row per matching record; an unknown user yields zero
    /// rows, not an error. Attributes absent from a record are simply
    /// missing from its row.
    async fn get_user_attr(&self, user: &str, attrs: &[&str]) -> StoreResult<Vec<AttrRow>>;

    /// Inserts or updates user records from a directory search.
    async fn upsert_users(&self, users: Vec<UserRecord>) -> StoreResult<()>;

    /// Inserts or updates group records from a directory search.
    async fn upsert_groups(&self, groups: Vec<GroupRecord>) -> StoreResult<()>;

    /// Replaces the cached group membership of a user.
    async fn set_initgroups(&self, user: &str, groups: Vec<String>) -> StoreResult<()>;

    /// Records a salted hash of the user's password for offline auth.
    async fn cache_password(&self, user: &str, password: &str) -> StoreResult<()>;
}
