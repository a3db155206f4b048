//! Time-bounded in-memory cache for fetched course resources.
//!
//! The cache is an ordinary value owned by whoever builds the services; there is
//! no process-wide instance. An optional cleanup task evicts expired entries and
//! is stopped by [`ResourceCache::dispose`] (or on drop).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

type Entries<V> = Arc<Mutex<HashMap<String, CacheEntry<V>>>>;

fn lock<V>(entries: &Entries<V>) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

fn purge<V>(entries: &Entries<V>) -> usize {
    let now = Instant::now();
    let mut guard = lock(entries);
    let before = guard.len();
    guard.retain(|_, entry| entry.expires_at > now);
    before - guard.len()
}

#[derive(Debug)]
pub struct ResourceCache<V> {
    ttl: Duration,
    entries: Entries<V>,
    cleanup: Mutex<Option<JoinHandle<()>>>,
}

impl<V: Clone + Send + 'static> ResourceCache<V> {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(Mutex::new(HashMap::new())),
            cleanup: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `key`; an expired entry is evicted and reported as a miss.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        let mut guard = lock(&self.entries);
        match guard.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                guard.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.insert_with_ttl(key, value, self.ttl);
    }

    pub fn insert_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        lock(&self.entries).insert(key.into(), entry);
    }

    /// Drop `key`; returns whether anything was cached under it.
    pub fn invalidate(&self, key: &str) -> bool {
        lock(&self.entries).remove(key).is_some()
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    /// Evict every expired entry and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        purge(&self.entries)
    }

    /// Number of stored entries, expired ones included until purged.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start the periodic eviction task on the current runtime.
    ///
    /// Returns `false` if a cleanup task is already running.
    pub fn start_cleanup(&self, period: Duration) -> bool {
        let mut slot = self.cleanup.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }
        let entries = Arc::clone(&self.entries);
        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let evicted = purge(&entries);
                if evicted > 0 {
                    trace!(evicted, "evicted expired cache entries");
                }
            }
        }));
        true
    }

    #[must_use]
    pub fn is_cleanup_running(&self) -> bool {
        self.cleanup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Stop the cleanup task and drop every entry.
    pub fn dispose(&self) {
        if let Some(handle) = self
            .cleanup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        self.clear();
    }
}

impl<V> Drop for ResourceCache<V> {
    fn drop(&mut self) {
        if let Some(handle) = self
            .cleanup
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = ResourceCache::new(Duration::from_secs(10));
        cache.insert("catalog", 1_u32);
        assert_eq!(cache.get("catalog"), Some(1));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(cache.get("catalog"), Some(1));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("catalog"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_only_removes_expired() {
        let cache = ResourceCache::new(Duration::from_secs(10));
        cache.insert("short", 1_u32);
        cache.insert_with_ttl("long", 2_u32, Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.get("long"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_task_evicts_until_disposed() {
        let cache = ResourceCache::new(Duration::from_secs(5));
        assert!(cache.start_cleanup(Duration::from_secs(60)));
        assert!(!cache.start_cleanup(Duration::from_secs(60)));

        cache.insert("a", "x".to_string());
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(cache.len(), 0);

        cache.dispose();
        tokio::task::yield_now().await;
        assert!(!cache.is_cleanup_running());

        cache.insert("b", "y".to_string());
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(cache.len(), 1, "no cleanup after dispose");
    }

    #[tokio::test]
    async fn invalidate_and_clear() {
        let cache = ResourceCache::new(DEFAULT_CACHE_TTL);
        cache.insert("a", 1_u8);
        cache.insert("b", 2_u8);
        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
