//! # authd-backend
//!
//! Ties the identity and authentication providers into one backend: reads
//! the configuration, wires both providers around a shared online
//! tracker, exports the helper environment, schedules the first
//! enumeration, and routes front-end requests to their handlers.

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod backend;
pub mod config;
pub mod error;

pub use backend::Backend;
pub use config::BackendConfig;
pub use error::{InitError, InitResult};
