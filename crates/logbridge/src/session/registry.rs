//! In-memory registry of live connection sessions.
//!
//! The shutdown coordinator drains this registry instead of tracking session
//! tasks through ambient globals. Each session task unregisters itself when
//! it finishes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Thread-safe registry of running session tasks.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, JoinHandle<()>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a running session task.
    pub async fn register(&self, id: Uuid, handle: JoinHandle<()>) {
        self.sessions.write().await.insert(id, handle);
    }

    /// Remove a session once its task has finished.
    pub async fn unregister(&self, id: Uuid) {
        self.sessions.write().await.remove(&id);
    }

    /// Count of sessions whose task is still running.
    pub async fn session_count(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Wait up to `grace` for every session to finish, aborting stragglers.
    ///
    /// Returns how many sessions had to be force-aborted.
    pub async fn drain(&self, grace: Duration) -> usize {
        let handles: Vec<(Uuid, JoinHandle<()>)> =
            self.sessions.write().await.drain().collect();
        if handles.is_empty() {
            return 0;
        }
        info!(sessions = handles.len(), "Draining live sessions");

        let deadline = Instant::now() + grace;
        let mut forced = 0;
        for (id, mut handle) in handles {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, &mut handle).await {
                Ok(_) => {}
                Err(_) => {
                    warn!(session = %id, "Session did not close within grace period, aborting");
                    handle.abort();
                    forced += 1;
                }
            }
        }
        forced
    }
}
