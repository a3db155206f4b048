use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_core::Clock;
use course_core::model::{ProgressKey, ProgressMap, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape of a user's remote progress document.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressDocument {
    pub progress: ProgressMap,
    pub last_updated: DateTime<Utc>,
}

/// Flat string key-value storage that survives restarts (the local mirror's backing).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the raw value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get_value(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn set_value(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`; deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn remove_value(&self, key: &str) -> Result<(), StorageError>;
}

/// Per-user progress documents in a remote document database.
#[async_trait]
pub trait RemoteProgressStore: Send + Sync {
    /// Fetch the user's progress map; an absent document yields an empty map.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` when the store is unreachable or rejects
    /// the request, `StorageError::Serialization` for an unreadable document.
    async fn load_progress(&self, user: &UserId) -> Result<ProgressMap, StorageError>;

    /// Upsert the whole map with merge semantics: keys missing from `progress`
    /// are left untouched remotely.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn save_progress(&self, user: &UserId, progress: &ProgressMap)
    -> Result<(), StorageError>;

    /// Write exactly one `progress.<key>` field.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn update_progress_field(
        &self,
        user: &UserId,
        key: ProgressKey,
        completed: bool,
    ) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    clock: Clock,
    values: Arc<Mutex<HashMap<String, String>>>,
    documents: Arc<Mutex<HashMap<UserId, ProgressDocument>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            clock,
            ..Self::default()
        }
    }

    /// Snapshot of the stored document for `user`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn document(&self, user: &UserId) -> Result<Option<ProgressDocument>, StorageError> {
        let guard = self
            .documents
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(user).cloned())
    }

    /// Every key currently present in the key-value space.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn keys(&self) -> Result<Vec<String>, StorageError> {
        let guard = self
            .values
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut keys: Vec<String> = guard.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl KeyValueStore for InMemoryRepository {
    async fn get_value(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .values
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .values
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove_value(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .values
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }
}

#[async_trait]
impl RemoteProgressStore for InMemoryRepository {
    async fn load_progress(&self, user: &UserId) -> Result<ProgressMap, StorageError> {
        Ok(self
            .document(user)?
            .map(|doc| doc.progress)
            .unwrap_or_default())
    }

    async fn save_progress(
        &self,
        user: &UserId,
        progress: &ProgressMap,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .documents
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let now = self.clock.now();
        let doc = guard.entry(user.clone()).or_insert_with(|| ProgressDocument {
            progress: ProgressMap::new(),
            last_updated: now,
        });
        doc.progress.merge(progress);
        doc.last_updated = now;
        Ok(())
    }

    async fn update_progress_field(
        &self,
        user: &UserId,
        key: ProgressKey,
        completed: bool,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .documents
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let now = self.clock.now();
        let doc = guard.entry(user.clone()).or_insert_with(|| ProgressDocument {
            progress: ProgressMap::new(),
            last_updated: now,
        });
        doc.progress.set(key, completed);
        doc.last_updated = now;
        Ok(())
    }
}

/// Aggregates the local key-value backing and the remote document store behind
/// trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub local: Arc<dyn KeyValueStore>,
    pub remote: Arc<dyn RemoteProgressStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let local: Arc<dyn KeyValueStore> = Arc::new(repo.clone());
        let remote: Arc<dyn RemoteProgressStore> = Arc::new(repo);
        Self { local, remote }
    }

    /// Replace the remote store, keeping the local backing.
    #[must_use]
    pub fn with_remote(self, remote: Arc<dyn RemoteProgressStore>) -> Self {
        Self {
            local: self.local,
            remote,
        }
    }
}
