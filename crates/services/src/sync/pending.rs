use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use course_core::model::{ProgressMap, UserId};

/// A registered map awaiting a full remote save.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub progress: ProgressMap,
    revision: u64,
}

/// In-process registry of progress maps whose remote write failed.
///
/// Never persisted: the local mirror already holds the same state, so losing
/// this on restart only delays the remote copy.
#[derive(Debug, Default)]
pub struct PendingSyncs {
    inner: Mutex<PendingInner>,
}

#[derive(Debug, Default)]
struct PendingInner {
    next_revision: u64,
    entries: HashMap<UserId, PendingEntry>,
}

impl PendingSyncs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `progress` as the latest unsynced state for `user`, replacing any older entry.
    pub fn register(&self, user: &UserId, progress: ProgressMap) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.next_revision += 1;
        let revision = inner.next_revision;
        inner
            .entries
            .insert(user.clone(), PendingEntry { progress, revision });
    }

    #[must_use]
    pub fn get(&self, user: &UserId) -> Option<PendingEntry> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.entries.get(user).cloned()
    }

    /// Remove the entry only if it is still the one that was pushed.
    ///
    /// Returns `false` when a newer failure re-registered the user meanwhile.
    pub fn clear_if_unchanged(&self, user: &UserId, pushed: &PendingEntry) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match inner.entries.get(user) {
            Some(current) if current.revision == pushed.revision => {
                inner.entries.remove(user);
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn contains(&self, user: &UserId) -> bool {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.entries.contains_key(user)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::{MaterialId, ProgressKey, WeekId};

    fn map(completed: bool) -> ProgressMap {
        [(ProgressKey::new(WeekId::number(1), MaterialId::new(0)), completed)]
            .into_iter()
            .collect()
    }

    #[test]
    fn newer_registration_replaces_older() {
        let pending = PendingSyncs::new();
        let user = UserId::new("u").unwrap();
        pending.register(&user, map(true));
        pending.register(&user, map(false));
        assert_eq!(pending.len(), 1);
        assert_eq!(pending.get(&user).unwrap().progress, map(false));
    }

    #[test]
    fn clear_keeps_entry_registered_after_push() {
        let pending = PendingSyncs::new();
        let user = UserId::new("u").unwrap();
        pending.register(&user, map(true));
        let pushed = pending.get(&user).unwrap();

        pending.register(&user, map(false));
        assert!(!pending.clear_if_unchanged(&user, &pushed));
        assert!(pending.contains(&user));

        let latest = pending.get(&user).unwrap();
        assert!(pending.clear_if_unchanged(&user, &latest));
        assert!(pending.is_empty());
    }
}
