//! # authd-provider-ldap
//!
//! The identity half of the authd backend: resolves users and groups from
//! an LDAP directory over a single shared session, and keeps the local
//! store fresh with a periodic enumeration task.
//!
//! The moving parts, leaves first:
//!
//! - [`authd_core::OnlineTracker`]: sticky offline flag with a timed
//!   recovery window, shared with the auth provider (lives in `authd-core`).
//! - [`attrmap::AttributeMap`]: maps entity kinds to the server-side
//!   attributes to request.
//! - [`connection::ConnectionManager`]: owns the at-most-one shared
//!   directory session; connect + bind with single-flight semantics.
//! - [`id::IdDispatcher`]: routes user/group/initgroups lookups.
//! - [`enumerate::EnumerationScheduler`]: periodic users-then-groups
//!   enumeration with modification-timestamp watermarks.
//! - [`directory`]: the seam to the directory codec, with the production
//!   `ldap3` adapter.
//!
//! [`provider::LdapIdProvider`] assembles the pieces.

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod attrmap;
pub mod config;
pub mod connection;
pub mod directory;
pub mod enumerate;
pub mod error;
pub mod id;
pub mod provider;

pub use config::{LdapProviderConfig, TlsPolicy};
pub use error::{IdError, IdResult};
pub use provider::LdapIdProvider;
