use async_trait::async_trait;
use course_core::model::{ProgressKey, ProgressMap, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{bool_json, conn, progress_from_json, progress_key_path, progress_to_json, ser};
use crate::repository::{ProgressDocument, RemoteProgressStore, StorageError};

impl SqliteRepository {
    /// Fetch the stored document, including its `last_updated` stamp.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on query or decode failure.
    pub async fn progress_document(
        &self,
        user: &UserId,
    ) -> Result<Option<ProgressDocument>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT progress, last_updated
            FROM progress_documents
            WHERE user_id = ?1
            ",
        )
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw: String = row.try_get("progress").map_err(ser)?;
        Ok(Some(ProgressDocument {
            progress: progress_from_json(&raw)?,
            last_updated: row.try_get("last_updated").map_err(ser)?,
        }))
    }
}

#[async_trait]
impl RemoteProgressStore for SqliteRepository {
    async fn load_progress(&self, user: &UserId) -> Result<ProgressMap, StorageError> {
        Ok(self
            .progress_document(user)
            .await?
            .map(|doc| doc.progress)
            .unwrap_or_default())
    }

    async fn save_progress(
        &self,
        user: &UserId,
        progress: &ProgressMap,
    ) -> Result<(), StorageError> {
        // json_patch merges object members and only drops keys patched to null,
        // which a boolean map never contains.
        sqlx::query(
            r"
            INSERT INTO progress_documents (user_id, progress, last_updated)
            VALUES (?1, json(?2), ?3)
            ON CONFLICT(user_id) DO UPDATE SET
                progress = json_patch(progress_documents.progress, excluded.progress),
                last_updated = excluded.last_updated
            ",
        )
        .bind(user.as_str())
        .bind(progress_to_json(progress)?)
        .bind(self.clock.now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn update_progress_field(
        &self,
        user: &UserId,
        key: ProgressKey,
        completed: bool,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO progress_documents (user_id, progress, last_updated)
            VALUES (?1, json_object(?2, json(?3)), ?4)
            ON CONFLICT(user_id) DO UPDATE SET
                progress = json_set(progress_documents.progress, ?5, json(?6)),
                last_updated = excluded.last_updated
            ",
        )
        .bind(user.as_str())
        .bind(key.to_string())
        .bind(bool_json(completed))
        .bind(self.clock.now())
        .bind(progress_key_path(key))
        .bind(bool_json(completed))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}
