//! Local mirror of progress, stored as JSON maps in a key-value backend.
//!
//! Anonymous progress lives under [`SHARED_PROGRESS_KEY`]; signed-in users get
//! their own `progress_<userId>` entry, seeded from the shared map on first write.

use std::sync::Arc;

use course_core::model::{MaterialId, ProgressKey, ProgressMap, UserId, WeekId};
use tokio::sync::Mutex;
use tracing::debug;

use crate::repository::{KeyValueStore, StorageError};

/// Key holding progress recorded without a signed-in user.
pub const SHARED_PROGRESS_KEY: &str = "courseProgress";

/// Key holding a signed-in user's progress.
#[must_use]
pub fn user_progress_key(user: &UserId) -> String {
    format!("progress_{user}")
}

fn storage_key(user: Option<&UserId>) -> String {
    user.map_or_else(|| SHARED_PROGRESS_KEY.to_owned(), user_progress_key)
}

/// Decode a stored map; unreadable data counts as no progress.
fn decode(key: &str, raw: &str) -> ProgressMap {
    serde_json::from_str(raw).unwrap_or_else(|err| {
        debug!(key, error = %err, "discarding malformed local progress");
        ProgressMap::new()
    })
}

/// Clones share one write lock, so read-modify-write saves never interleave.
#[derive(Clone)]
pub struct LocalProgressStore {
    backend: Arc<dyn KeyValueStore>,
    writes: Arc<Mutex<()>>,
}

impl LocalProgressStore {
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            writes: Arc::new(Mutex::new(())),
        }
    }

    /// Load the user's map when it exists, otherwise the shared map.
    ///
    /// Missing or malformed data yields an empty map.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` only when the backend itself fails.
    pub async fn load(&self, user: Option<&UserId>) -> Result<ProgressMap, StorageError> {
        if let Some(user) = user {
            let key = user_progress_key(user);
            if let Some(raw) = self.backend.get_value(&key).await? {
                return Ok(decode(&key, &raw));
            }
        }
        Ok(self
            .backend
            .get_value(SHARED_PROGRESS_KEY)
            .await?
            .map(|raw| decode(SHARED_PROGRESS_KEY, &raw))
            .unwrap_or_default())
    }

    /// Set one completion flag in the user's map (or the shared map when anonymous).
    ///
    /// The flag is merged into whatever [`load`](Self::load) returns, so a user
    /// without an entry yet starts from the shared map.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read or written.
    pub async fn save(
        &self,
        week: WeekId,
        material: MaterialId,
        completed: bool,
        user: Option<&UserId>,
    ) -> Result<(), StorageError> {
        let _guard = self.writes.lock().await;
        let mut progress = self.load(user).await?;
        progress.set(ProgressKey::new(week, material), completed);
        self.write(&storage_key(user), &progress).await
    }

    /// Replace the stored map wholesale.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    pub async fn save_map(
        &self,
        user: Option<&UserId>,
        progress: &ProgressMap,
    ) -> Result<(), StorageError> {
        let _guard = self.writes.lock().await;
        self.write(&storage_key(user), progress).await
    }

    async fn write(&self, key: &str, progress: &ProgressMap) -> Result<(), StorageError> {
        let raw = serde_json::to_string(progress)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.backend.set_value(key, &raw).await
    }
}
