//! # authd-store
//!
//! Contract between the backend providers and the daemon's local store:
//! attribute reads, persistence of directory search results, and the
//! asynchronous password-cache write used for offline authentication.
//!
//! The production on-disk store lives outside this repository; the
//! [`MemoryStore`] here is the reference implementation used by the daemon
//! shell and by tests.

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod error;
pub mod memory;
pub mod provider;
pub mod record;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use provider::IdentityStore;
pub use record::{AttrRow, GroupRecord, UserRecord};

/// Attribute under which a user's principal name is stored.
pub const ATTR_UPN: &str = "userPrincipalName";
