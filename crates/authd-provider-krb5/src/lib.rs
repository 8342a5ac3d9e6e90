//! # authd-provider-krb5
//!
//! The authentication half of the authd backend. Authentication and
//! password changes are delegated to a privilege-separated helper child
//! that talks to the KDC; this crate resolves the user's principal name,
//! frames the request over a pipe, supervises the child, parses the
//! framed reply, and feeds the online/offline model. On successful online
//! authentication it can hand the password to the local store for offline
//! caching.

#![deny(warnings)]
#![deny(missing_docs)]

pub mod auth;
pub mod child;
pub mod config;
pub mod error;
pub mod protocol;

pub use auth::Krb5AuthProvider;
pub use config::{Krb5Config, Krb5Context};
pub use error::{AuthError, AuthResult};
pub use protocol::MAX_CHILD_MSG_SIZE;
