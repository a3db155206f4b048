use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use course_core::aggregate;
use course_core::model::{MaterialId, ProgressKey, ProgressMap, ResourceCatalog, UserId, WeekId};
use storage::LocalProgressStore;
use storage::repository::{RemoteProgressStore, StorageError};
use tracing::{debug, info, warn};

use super::outcome::{SyncIssue, SyncPhase, SyncResult};
use super::pending::PendingSyncs;

//
// ─── SESSION TICKET ────────────────────────────────────────────────────────────
//

/// Identity an operation acts for, captured when it starts.
///
/// The generation moves on every `initialize`, so a ticket taken before a
/// login/logout never matches again even if the same user signs back in.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionTicket {
    user: Option<UserId>,
    generation: u64,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    phase: SyncPhase,
    ticket: Option<SessionTicket>,
    progress: ProgressMap,
    sync_error: Option<String>,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Keeps the in-memory progress map, the local mirror, and the remote document
/// in step for the signed-in user (or the shared local map when anonymous).
///
/// Local state always wins: toggles commit in memory and locally regardless of
/// the remote outcome. Remote failures are recorded for periodic retry and
/// surfaced as a non-fatal `sync_error`.
pub struct ProgressSyncService {
    local: LocalProgressStore,
    remote: Arc<dyn RemoteProgressStore>,
    pending: PendingSyncs,
    state: Mutex<CoordinatorState>,
}

impl ProgressSyncService {
    #[must_use]
    pub fn new(local: LocalProgressStore, remote: Arc<dyn RemoteProgressStore>) -> Self {
        Self {
            local,
            remote,
            pending: PendingSyncs::new(),
            state: Mutex::new(CoordinatorState::default()),
        }
    }

    /// Load progress for `user` (or anonymously) and move to `Ready`.
    ///
    /// Signed-in users load from the remote store first and mirror the result
    /// locally. If the remote is unreachable the local copy is used instead, and
    /// a non-empty local copy is pushed back in the background.
    pub async fn initialize(&self, user: Option<UserId>) -> SyncResult {
        let ticket = self.begin_session(user);
        info!(user = ?ticket.user, "loading progress");

        let Some(user) = ticket.user.clone() else {
            return match self.local.load(None).await {
                Ok(progress) => self.finish_load(&ticket, progress, SyncResult::Success),
                Err(err) => self.finish_load(&ticket, ProgressMap::new(), local_issue(&err)),
            };
        };

        match self.remote.load_progress(&user).await {
            Ok(progress) => {
                if !self.is_current(&ticket) {
                    return SyncResult::Failed(SyncIssue::StaleSession);
                }
                let outcome = match self.local.save_map(Some(&user), &progress).await {
                    Ok(()) => SyncResult::Success,
                    Err(err) => local_issue(&err),
                };
                self.finish_load(&ticket, progress, outcome)
            }
            Err(err) => {
                warn!(%user, error = %err, "remote progress unavailable, using local copy");
                let progress = match self.local.load(Some(&user)).await {
                    Ok(progress) => progress,
                    Err(local_err) => {
                        warn!(%user, error = %local_err, "local progress unavailable");
                        ProgressMap::new()
                    }
                };
                let fallback = progress.clone();
                let outcome = self.finish_load(
                    &ticket,
                    progress,
                    SyncResult::Degraded(SyncIssue::RemoteUnavailable(err.to_string())),
                );
                if !fallback.is_empty() && outcome != SyncResult::Failed(SyncIssue::StaleSession) {
                    self.push_in_background(user, fallback);
                }
                outcome
            }
        }
    }

    /// Flip the completion flag for one material.
    ///
    /// Refused with `NotReady` until `initialize` has finished for the current
    /// session, so a load never overwrites a toggle.
    ///
    /// The in-memory map changes before anything is persisted and is never rolled
    /// back. Signed-in users get a single-field remote update followed by a local
    /// mirror write; a remote failure still writes locally and queues the full
    /// map for retry. Anonymous users only write the shared local map.
    pub async fn toggle_completion(&self, week: WeekId, material: MaterialId) -> SyncResult {
        let key = ProgressKey::new(week, material);
        let (ticket, completed) = {
            let mut state = self.state();
            if state.phase != SyncPhase::Ready {
                debug!(%key, phase = ?state.phase, "toggle ignored before progress loaded");
                return SyncResult::Failed(SyncIssue::NotReady);
            }
            let completed = state.progress.toggle(key);
            (state.ticket.clone(), completed)
        };
        debug!(%key, completed, "toggled completion");

        let Some(user) = ticket.as_ref().and_then(|t| t.user.clone()) else {
            return match self.local.save(week, material, completed, None).await {
                Ok(()) => SyncResult::Success,
                Err(err) => local_issue(&err),
            };
        };

        let remote = self
            .remote
            .update_progress_field(&user, key, completed)
            .await;

        if !ticket.as_ref().is_some_and(|t| self.is_current(t)) {
            debug!(%user, %key, "session changed during toggle, dropping result");
            return SyncResult::Failed(SyncIssue::StaleSession);
        }

        let local = self.local.save(week, material, completed, Some(&user)).await;

        match remote {
            Ok(()) => {
                // Keep a queued retry from replaying an older snapshot over this write.
                if self.pending.contains(&user) {
                    self.pending.register(&user, self.progress());
                }
                match local {
                    Ok(()) => SyncResult::Success,
                    Err(err) => local_issue(&err),
                }
            }
            Err(err) => {
                warn!(%user, %key, error = %err, "remote update failed, queued for retry");
                if let Err(local_err) = &local {
                    warn!(%user, error = %local_err, "local mirror write failed as well");
                }
                self.pending.register(&user, self.progress());
                self.set_sync_error(format!(
                    "Progress saved on this device only; will retry syncing ({err})"
                ));
                SyncResult::Degraded(SyncIssue::RemoteUnavailable(err.to_string()))
            }
        }
    }

    /// Push the queued map for `user`, if any, as a full merge save.
    ///
    /// For the signed-in user the current in-memory map is pushed, since it
    /// supersedes the queued snapshot. The entry is only cleared on success and
    /// only if no newer failure replaced it meanwhile.
    pub async fn retry_pending_syncs(&self, user: &UserId) -> SyncResult {
        let Some(entry) = self.pending.get(user) else {
            return SyncResult::Success;
        };

        let (progress, ticket) = {
            let state = self.state();
            match &state.ticket {
                Some(ticket) if ticket.user.as_ref() == Some(user) => {
                    (state.progress.clone(), Some(ticket.clone()))
                }
                _ => (entry.progress.clone(), None),
            }
        };

        match self.remote.save_progress(user, &progress).await {
            Ok(()) => {
                let cleared = self.pending.clear_if_unchanged(user, &entry);
                debug!(%user, cleared, "pending progress synced");
                if cleared && ticket.is_some_and(|t| self.is_current(&t)) {
                    self.clear_sync_error();
                }
                SyncResult::Success
            }
            Err(err) => {
                debug!(%user, error = %err, "retry failed, keeping pending progress");
                SyncResult::Failed(SyncIssue::RemoteUnavailable(err.to_string()))
            }
        }
    }

    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        self.state().phase
    }

    /// Snapshot of the in-memory progress map.
    #[must_use]
    pub fn progress(&self) -> ProgressMap {
        self.state().progress.clone()
    }

    #[must_use]
    pub fn is_completed(&self, week: WeekId, material: MaterialId) -> bool {
        self.state().progress.is_completed(week, material)
    }

    #[must_use]
    pub fn current_user(&self) -> Option<UserId> {
        self.state().ticket.as_ref().and_then(|t| t.user.clone())
    }

    /// Last remote failure message, for display; `None` once synced again.
    #[must_use]
    pub fn sync_error(&self) -> Option<String> {
        self.state().sync_error.clone()
    }

    pub fn clear_sync_error(&self) {
        self.state().sync_error = None;
    }

    /// Map queued for retry for `user`, if any.
    #[must_use]
    pub fn pending_for(&self, user: &UserId) -> Option<ProgressMap> {
        self.pending.get(user).map(|entry| entry.progress)
    }

    #[must_use]
    pub fn percent_complete(&self, catalog: &ResourceCatalog, week: WeekId) -> u8 {
        aggregate::percent_complete(catalog, &self.state().progress, week)
    }

    #[must_use]
    pub fn percent_complete_total(&self, catalog: &ResourceCatalog) -> u8 {
        aggregate::percent_complete_total(catalog, &self.state().progress)
    }

    fn state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_session(&self, user: Option<UserId>) -> SessionTicket {
        let mut state = self.state();
        let generation = state.ticket.as_ref().map_or(1, |t| t.generation + 1);
        let ticket = SessionTicket { user, generation };
        state.ticket = Some(ticket.clone());
        state.phase = SyncPhase::Loading;
        state.progress = ProgressMap::new();
        state.sync_error = None;
        ticket
    }

    fn is_current(&self, ticket: &SessionTicket) -> bool {
        self.state().ticket.as_ref() == Some(ticket)
    }

    fn finish_load(
        &self,
        ticket: &SessionTicket,
        progress: ProgressMap,
        outcome: SyncResult,
    ) -> SyncResult {
        let mut state = self.state();
        if state.ticket.as_ref() != Some(ticket) {
            return SyncResult::Failed(SyncIssue::StaleSession);
        }
        state.progress = progress;
        state.phase = SyncPhase::Ready;
        if let SyncResult::Degraded(SyncIssue::RemoteUnavailable(reason)) = &outcome {
            state.sync_error = Some(format!("Using progress saved on this device ({reason})"));
        }
        outcome
    }

    fn set_sync_error(&self, message: String) {
        self.state().sync_error = Some(message);
    }

    fn push_in_background(&self, user: UserId, progress: ProgressMap) {
        let remote = Arc::clone(&self.remote);
        tokio::spawn(async move {
            match remote.save_progress(&user, &progress).await {
                Ok(()) => debug!(%user, "pushed local progress to remote"),
                Err(err) => debug!(%user, error = %err, "opportunistic push failed"),
            }
        });
    }
}

fn local_issue(err: &StorageError) -> SyncResult {
    warn!(error = %err, "local progress store failed");
    SyncResult::Degraded(SyncIssue::LocalStore(err.to_string()))
}
