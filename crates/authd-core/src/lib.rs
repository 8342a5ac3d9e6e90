//! # authd-core
//!
//! Shared types for the authd backend: the request/reply contract spoken
//! with the front-end router, errno-style completion statuses, PAM status
//! and command codes, and the per-domain configuration knobs.
//!
//! Everything here is plain data; the provider crates supply the behavior.

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod config;
pub mod online;
pub mod request;
pub mod status;

pub use config::DomainConfig;
pub use online::OnlineTracker;
pub use request::{
    AccountRequest, AttrType, EntryType, FilterType, OnlineStatus, PamCommand, PamRequest,
    PamResponse, PamStatus, Reply, Request, RequestTarget, Responder, PAM_RESPONSE_ENV_ITEM,
    PAM_RESPONSE_MESSAGE,
};
pub use status::Completion;
