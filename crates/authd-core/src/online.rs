//! Sticky online/offline state.
//!
//! The tracker is sticky so repeated requests during an outage do not
//! hammer the server: once marked offline it stays offline for
//! `offline_timeout`, then auto-recovers. No explicit probe is needed:
//! the next dispatched request reopens a connection, and if that fails the
//! tracker is marked offline again.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::request::OnlineStatus;

#[derive(Debug)]
struct State {
    offline: bool,
    went_offline: Instant,
}

/// Sticky offline flag with a timed automatic recovery window.
///
/// Shared between the identity dispatcher and the auth pipeline.
#[derive(Debug)]
pub struct OnlineTracker {
    state: Mutex<State>,
    offline_timeout: Duration,
}

impl OnlineTracker {
    /// Creates a tracker in the online state.
    #[must_use]
    pub fn new(offline_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(State {
                offline: false,
                went_offline: Instant::now(),
            }),
            offline_timeout,
        }
    }

    /// Marks the backend offline, starting the recovery window.
    ///
    /// Re-marking while already inside the window is a no-op: the
    /// timestamp stays monotonic non-decreasing and the window is not
    /// extended.
    pub fn mark_offline(&self) {
        let mut state = self.state.lock().expect("online state lock poisoned");
        let inside_window =
            state.offline && state.went_offline.elapsed() < self.offline_timeout;
        if !inside_window {
            state.offline = true;
            state.went_offline = Instant::now();
            tracing::info!("backend marked offline");
        }
    }

    /// Whether the backend is currently considered offline.
    #[must_use]
    pub fn is_offline(&self) -> bool {
        let state = self.state.lock().expect("online state lock poisoned");
        state.offline && state.went_offline.elapsed() < self.offline_timeout
    }

    /// The current state in front-end terms.
    #[must_use]
    pub fn status(&self) -> OnlineStatus {
        if self.is_offline() {
            OnlineStatus::Offline
        } else {
            OnlineStatus::Online
        }
    }

    /// When the tracker last flipped offline, if the flag is set.
    #[must_use]
    pub fn went_offline(&self) -> Option<Instant> {
        let state = self.state.lock().expect("online state lock poisoned");
        state.offline.then_some(state.went_offline)
    }
}
