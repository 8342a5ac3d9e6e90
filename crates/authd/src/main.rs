//! # authd
//!
//! Daemon shell for the backend: loads configuration from the
//! environment, initializes the providers, and runs until signalled.
//! The front-end name-service and PAM responders connect through the
//! `authd-backend` dispatch API.

#![forbid(unsafe_code)]
#![deny(warnings)]

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use authd_backend::{Backend, BackendConfig};
use authd_store::MemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = BackendConfig::from_env()?;
    tracing::info!(domain = %config.domain.name, uri = %config.ldap.uri, "authd starting");

    // The on-disk store is provided by the surrounding daemon; the
    // standalone shell runs against the in-memory reference store.
    let store = Arc::new(MemoryStore::new());
    let backend = Arc::new(Backend::init(config, store)?);

    shutdown_signal().await;
    tracing::info!("shutting down");
    backend.shutdown().await;

    Ok(())
}

/// Completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            tracing::warn!(error = %e, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}
