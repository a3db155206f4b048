//! Progress documents in Cloud Firestore, over its REST API.
//!
//! Each user owns `{collection}/{userId}` with a `progress` map of booleans and a
//! `lastUpdated` timestamp. Writes are `PATCH`es with an update mask so only the
//! named fields change; missing documents are created.

use std::collections::BTreeMap;
use std::env;

use async_trait::async_trait;
use course_core::Clock;
use course_core::model::{ProgressKey, ProgressMap, UserId};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::repository::{RemoteProgressStore, StorageError};

const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const DEFAULT_COLLECTION: &str = "userProgress";
const PROGRESS_FIELD: &str = "progress";
const LAST_UPDATED_FIELD: &str = "lastUpdated";

#[derive(Clone, Debug)]
pub struct FirestoreConfig {
    pub base_url: String,
    pub project_id: String,
    pub collection: String,
    pub access_token: Option<String>,
}

impl FirestoreConfig {
    #[must_use]
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            project_id: project_id.into(),
            collection: DEFAULT_COLLECTION.into(),
            access_token: None,
        }
    }

    /// Read `COURSE_FIRESTORE_*` variables; `None` unless a project is set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let project_id = env::var("COURSE_FIRESTORE_PROJECT").ok()?;
        if project_id.trim().is_empty() {
            return None;
        }
        let base_url =
            env::var("COURSE_FIRESTORE_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let collection = env::var("COURSE_FIRESTORE_COLLECTION")
            .unwrap_or_else(|_| DEFAULT_COLLECTION.into());
        let access_token = env::var("COURSE_FIRESTORE_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        Some(Self {
            base_url,
            project_id,
            collection,
            access_token,
        })
    }

    /// Document URL for `user`, with every path part encoded as one segment.
    fn document_url(&self, user: &UserId) -> Result<Url, StorageError> {
        let mut url = Url::parse(self.base_url.trim_end_matches('/'))
            .map_err(|e| StorageError::Connection(format!("invalid firestore base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| {
                StorageError::Connection("firestore base url cannot hold a path".into())
            })?
            .pop_if_empty()
            .extend([
                "projects",
                self.project_id.as_str(),
                "databases",
                "(default)",
                "documents",
                self.collection.as_str(),
                user.as_str(),
            ]);
        Ok(url)
    }
}

#[derive(Clone)]
pub struct FirestoreRemoteStore {
    client: Client,
    config: FirestoreConfig,
    clock: Clock,
}

impl FirestoreRemoteStore {
    #[must_use]
    pub fn new(config: FirestoreConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            clock: Clock::default(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn patch(
        &self,
        user: &UserId,
        entries: impl Iterator<Item = (ProgressKey, bool)>,
    ) -> Result<(), StorageError> {
        let mut mask = Vec::new();
        let mut progress = BTreeMap::new();
        for (key, completed) in entries {
            mask.push(("updateMask.fieldPaths", progress_field_path(key)));
            progress.insert(key.to_string(), Value::boolean(completed));
        }
        mask.push(("updateMask.fieldPaths", LAST_UPDATED_FIELD.to_string()));

        let body = Document {
            fields: BTreeMap::from([
                (PROGRESS_FIELD.to_string(), Value::map(progress)),
                (
                    LAST_UPDATED_FIELD.to_string(),
                    Value::timestamp(self.clock.now().to_rfc3339()),
                ),
            ]),
        };

        let url = self.config.document_url(user)?;
        debug!(%user, fields = mask.len(), "patching progress document");
        let response = self
            .authorize(self.client.patch(url))
            .query(&mask)
            .json(&body)
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteProgressStore for FirestoreRemoteStore {
    async fn load_progress(&self, user: &UserId) -> Result<ProgressMap, StorageError> {
        let url = self.config.document_url(user)?;
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(ProgressMap::new());
        }
        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }

        let doc: Document = response
            .json()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(decode_progress(&doc))
    }

    async fn save_progress(
        &self,
        user: &UserId,
        progress: &ProgressMap,
    ) -> Result<(), StorageError> {
        self.patch(user, progress.iter()).await
    }

    async fn update_progress_field(
        &self,
        user: &UserId,
        key: ProgressKey,
        completed: bool,
    ) -> Result<(), StorageError> {
        self.patch(user, std::iter::once((key, completed))).await
    }
}

fn status_error(status: StatusCode) -> StorageError {
    StorageError::Connection(format!("firestore responded with status {status}"))
}

/// Field path for one progress entry. Keys contain `-`, so the segment is back-quoted.
fn progress_field_path(key: ProgressKey) -> String {
    format!("{PROGRESS_FIELD}.`{key}`")
}

fn decode_progress(doc: &Document) -> ProgressMap {
    let Some(fields) = doc
        .fields
        .get(PROGRESS_FIELD)
        .and_then(|v| v.map_value.as_ref())
    else {
        return ProgressMap::new();
    };
    fields
        .fields
        .iter()
        .filter_map(|(key, value)| Some((key.parse::<ProgressKey>().ok()?, value.boolean_value?)))
        .collect()
}

//
// ─── WIRE TYPES ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    fields: BTreeMap<String, Value>,
}

/// Subset of Firestore's typed `Value` used by progress documents.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Value {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    boolean_value: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    map_value: Option<MapValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp_value: Option<String>,
}

impl Value {
    fn boolean(v: bool) -> Self {
        Self {
            boolean_value: Some(v),
            ..Self::default()
        }
    }

    fn map(fields: BTreeMap<String, Value>) -> Self {
        Self {
            map_value: Some(MapValue { fields }),
            ..Self::default()
        }
    }

    fn timestamp(rfc3339: String) -> Self {
        Self {
            timestamp_value: Some(rfc3339),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MapValue {
    #[serde(default)]
    fields: BTreeMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::{MaterialId, WeekId};

    #[test]
    fn document_url_uses_default_database() {
        let mut config = FirestoreConfig::new("course-portal");
        config.base_url = "http://localhost:8080/v1/".into();
        let url = config.document_url(&UserId::new("u1").unwrap()).unwrap();
        assert_eq!(
            url.as_str(),
            concat!(
                "http://localhost:8080/v1/projects/course-portal",
                "/databases/(default)/documents/userProgress/u1"
            )
        );
    }

    #[test]
    fn document_url_keeps_user_in_one_segment() {
        let mut config = FirestoreConfig::new("course-portal");
        config.base_url = "http://localhost:8080/v1".into();
        let url = config
            .document_url(&UserId::new("a b?c#d%").unwrap())
            .unwrap();
        assert_eq!(
            url.path_segments().unwrap().last(),
            Some("a%20b%3Fc%23d%25")
        );
        assert!(url.query().is_none());
    }

    #[test]
    fn field_path_back_quotes_key() {
        let key = ProgressKey::new(WeekId::number(1), MaterialId::new(0));
        assert_eq!(progress_field_path(key), "progress.`1-0`");
    }

    #[test]
    fn decodes_progress_and_skips_foreign_values() {
        let raw = r#"{
            "name": "projects/p/databases/(default)/documents/userProgress/u1",
            "fields": {
                "progress": { "mapValue": { "fields": {
                    "1-0": { "booleanValue": true },
                    "1-1": { "booleanValue": false },
                    "1-2": { "stringValue": "yes" },
                    "junk": { "booleanValue": true }
                } } },
                "lastUpdated": { "timestampValue": "2024-01-01T00:00:00Z" }
            }
        }"#;
        let doc: Document = serde_json::from_str(raw).unwrap();
        let progress = decode_progress(&doc);
        assert_eq!(progress.len(), 2);
        assert!(progress.is_completed(WeekId::number(1), MaterialId::new(0)));
    }

    #[test]
    fn empty_map_value_decodes_empty() {
        let doc: Document =
            serde_json::from_str(r#"{"fields":{"progress":{"mapValue":{}}}}"#).unwrap();
        assert!(decode_progress(&doc).is_empty());
        assert!(decode_progress(&Document::default()).is_empty());
    }

    #[test]
    fn encodes_typed_values() {
        let body = Document {
            fields: BTreeMap::from([(
                "progress".to_string(),
                Value::map(BTreeMap::from([("2-1".to_string(), Value::boolean(true))])),
            )]),
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"fields":{"progress":{"mapValue":{"fields":{"2-1":{"booleanValue":true}}}}}}"#
        );
    }
}
