//! Periodic directory enumeration.
//!
//! Keeps the local store fresh by bulk-fetching all users, then all
//! groups. After the first full fetch, cycles are deltas: each phase
//! tracks the highest modification timestamp it has seen (the watermark)
//! and asks the server only for entries strictly newer than it. The
//! protocol has no strict-greater comparator, so "newer than W" is
//! spelled `(modstamp>=W)` and `(!(modstamp=W))`.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use authd_core::OnlineTracker;

use crate::attrmap::AttributeMap;
use crate::config::LdapProviderConfig;
use crate::connection::ConnectionManager;
use crate::error::IdResult;

/// Delta-enumeration cursors, one per phase.
#[derive(Debug, Default, Clone)]
pub struct Watermarks {
    /// Highest user modification timestamp applied so far.
    pub users: Option<String>,

    /// Highest group modification timestamp applied so far.
    pub groups: Option<String>,
}

/// Runs the users-then-groups enumeration cycle on a timer.
pub struct EnumerationScheduler {
    config: Arc<LdapProviderConfig>,
    connections: Arc<ConnectionManager>,
    online: Arc<OnlineTracker>,
    watermarks: Mutex<Watermarks>,
}

impl EnumerationScheduler {
    /// Creates a scheduler with empty watermarks.
    #[must_use]
    pub fn new(
        config: Arc<LdapProviderConfig>,
        connections: Arc<ConnectionManager>,
        online: Arc<OnlineTracker>,
    ) -> Self {
        Self {
            config,
            connections,
            online,
            watermarks: Mutex::new(Watermarks::default()),
        }
    }

    /// Current watermark values.
    #[must_use]
    pub fn watermarks(&self) -> Watermarks {
        self.watermarks.lock().expect("watermark lock poisoned").clone()
    }

    /// Primes the watermarks, e.g. from a persisted snapshot.
    pub fn set_watermarks(&self, watermarks: Watermarks) {
        *self.watermarks.lock().expect("watermark lock poisoned") = watermarks;
    }

    /// Runs one full cycle: users first, then groups. Groups only start
    /// after the user phase resolved; a failed user phase fails the
    /// cycle and leaves both watermarks alone.
    pub async fn run_cycle(&self) -> IdResult<()> {
        self.enumerate_users().await?;
        self.enumerate_groups().await?;
        Ok(())
    }

    async fn enumerate_users(&self) -> IdResult<()> {
        let filter = {
            let watermarks = self.watermarks.lock().expect("watermark lock poisoned");
            enum_filter(&self.config.user_map, watermarks.users.as_deref())
        };
        let attrs = self.config.user_map.request_attrs();

        let session = self.connect().await?;
        let returned = session.search_users(&filter, &attrs).await?;

        let mut watermarks = self.watermarks.lock().expect("watermark lock poisoned");
        advance_watermark(&mut watermarks.users, returned);
        tracing::debug!(watermark = ?watermarks.users, "user enumeration complete");
        Ok(())
    }

    async fn enumerate_groups(&self) -> IdResult<()> {
        let filter = {
            let watermarks = self.watermarks.lock().expect("watermark lock poisoned");
            enum_filter(&self.config.group_map, watermarks.groups.as_deref())
        };
        let attrs = self.config.group_map.request_attrs();

        let session = self.connect().await?;
        let returned = session.search_groups(&filter, &attrs).await?;

        let mut watermarks = self.watermarks.lock().expect("watermark lock poisoned");
        advance_watermark(&mut watermarks.groups, returned);
        tracing::debug!(watermark = ?watermarks.groups, "group enumeration complete");
        Ok(())
    }

    async fn connect(&self) -> IdResult<Arc<dyn crate::directory::DirectorySession>> {
        match self.connections.ensure_connected().await {
            Ok(session) => Ok(session),
            Err(err) => {
                if err.is_transport() {
                    self.online.mark_offline();
                }
                Err(err)
            }
        }
    }

    /// Spawns the periodic task. The first cycle fires immediately.
    ///
    /// On success the next cycle is scheduled `enum_refresh_timeout` from
    /// the *start* of the previous one; on failure, from now. A watchdog
    /// of the same length cancels a cycle that has not completed, so a
    /// wedged cycle cannot block the enumeration slot.
    #[must_use]
    pub fn spawn(self: Arc<Self>) -> EnumerationHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let refresh = self.config.enum_refresh();

        let task = tokio::spawn(async move {
            loop {
                let started = Instant::now();

                let outcome = tokio::select! {
                    outcome = tokio::time::timeout(refresh, self.run_cycle()) => outcome,
                    _ = shutdown_rx.changed() => break,
                };

                let reschedule_from = match outcome {
                    Ok(Ok(())) => started,
                    Ok(Err(err)) => {
                        tracing::warn!(error = %err, "enumeration cycle failed, retrying later");
                        Instant::now()
                    }
                    Err(_) => {
                        tracing::warn!(
                            timeout_secs = refresh.as_secs(),
                            "enumeration timed out; refresh interval too small?"
                        );
                        Instant::now()
                    }
                };

                tokio::select! {
                    () = tokio::time::sleep_until(reschedule_from + refresh) => {}
                    _ = shutdown_rx.changed() => break,
                }
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        });

        EnumerationHandle { task, shutdown_tx }
    }
}

/// Handle to the running enumeration task.
pub struct EnumerationHandle {
    task: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl EnumerationHandle {
    /// Stops the task, cancelling an in-flight cycle.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

/// Builds the per-phase enumeration filter.
///
/// Without a watermark (or with no modstamp attribute mapped) the filter
/// selects every named entry of the object class; with one it additionally
/// requires a strictly newer modification timestamp.
pub(crate) fn enum_filter(map: &AttributeMap, watermark: Option<&str>) -> String {
    match (watermark, map.modstamp.as_deref()) {
        (Some(mark), Some(modstamp)) => format!(
            "(&({name}=*)(objectclass={oc})({modstamp}>={mark})(!({modstamp}={mark})))",
            name = map.name,
            oc = map.object_class,
        ),
        _ => format!(
            "(&({}=*)(objectclass={}))",
            map.name, map.object_class
        ),
    }
}

/// Replaces the watermark when the server reported a strictly newer
/// maximum; otherwise leaves it untouched.
pub(crate) fn advance_watermark(current: &mut Option<String>, returned: Option<String>) {
    if let Some(ts) = returned {
        if current.as_deref().is_none_or(|cur| ts.as_str() > cur) {
            *current = Some(ts);
        }
    }
}
