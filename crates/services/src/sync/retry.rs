use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::debug;

use super::coordinator::ProgressSyncService;
use super::outcome::SyncResult;

/// How often queued progress is pushed again while a user is signed in.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(60);

/// Background task retrying queued remote saves on a fixed cadence.
///
/// Each tick retries the current user's queue only; ticks with no signed-in user
/// do nothing. Retries are unbounded with no backoff. Dropping the worker stops it.
#[derive(Debug)]
pub struct RetryWorker {
    handle: JoinHandle<()>,
}

impl RetryWorker {
    /// Spawn the worker on the current tokio runtime. The first attempt happens
    /// one full `period` after spawning.
    #[must_use]
    pub fn spawn(service: Arc<ProgressSyncService>, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(user) = service.current_user() else {
                    continue;
                };
                if let SyncResult::Failed(issue) = service.retry_pending_syncs(&user).await {
                    debug!(%user, %issue, "pending progress still unsynced");
                }
            }
        });
        Self { handle }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the worker. An in-flight retry is abandoned; its entry stays queued.
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for RetryWorker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
