//! Exercises the Firestore adapter against a minimal in-process stand-in for the REST API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Json;
use course_core::model::{MaterialId, ProgressKey, ProgressMap, UserId, WeekId};
use serde_json::{Value, json};
use storage::firestore::{FirestoreConfig, FirestoreRemoteStore};
use storage::repository::{RemoteProgressStore, StorageError};

#[derive(Clone, Default)]
struct FakeFirestore {
    docs: Arc<Mutex<HashMap<String, Value>>>,
    queries: Arc<Mutex<Vec<String>>>,
}

type DocPath = Path<(String, String, String, String)>;

async fn get_doc(
    State(fake): State<FakeFirestore>,
    Path((_, _, _, user)): DocPath,
) -> Result<Json<Value>, StatusCode> {
    if user == "offline" {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    let docs = fake.docs.lock().unwrap();
    docs.get(&user).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// Merges the body's progress entries into the stored document, like a masked PATCH.
async fn patch_doc(
    State(fake): State<FakeFirestore>,
    Path((_, _, _, user)): DocPath,
    RawQuery(query): RawQuery,
    Json(body): Json<Value>,
) -> StatusCode {
    if user == "offline" {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    fake.queries.lock().unwrap().push(query.unwrap_or_default());

    let mut docs = fake.docs.lock().unwrap();
    let doc = docs
        .entry(user)
        .or_insert_with(|| json!({ "fields": { "progress": { "mapValue": { "fields": {} } } } }));
    let incoming = body["fields"]["progress"]["mapValue"]["fields"]
        .as_object()
        .cloned()
        .unwrap_or_default();
    let stored = doc["fields"]["progress"]["mapValue"]["fields"]
        .as_object_mut()
        .expect("stored progress map");
    stored.extend(incoming);
    doc["fields"]["lastUpdated"] = body["fields"]["lastUpdated"].clone();
    StatusCode::OK
}

async fn start() -> (FakeFirestore, FirestoreRemoteStore) {
    let fake = FakeFirestore::default();
    let app = Router::new()
        .route(
            "/v1/projects/:project/databases/:database/documents/:collection/:user",
            get(get_doc).patch(patch_doc),
        )
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let mut config = FirestoreConfig::new("course-portal");
    config.base_url = format!("http://{addr}/v1");
    config.access_token = Some("test-token".into());
    (fake, FirestoreRemoteStore::new(config))
}

fn key(week: u32, material: u64) -> ProgressKey {
    ProgressKey::new(WeekId::number(week), MaterialId::new(material))
}

#[tokio::test]
async fn missing_document_is_empty_progress() {
    let (_, store) = start().await;
    let user = UserId::new("fresh").unwrap();
    assert!(store.load_progress(&user).await.unwrap().is_empty());
}

#[tokio::test]
async fn update_field_sends_masked_patch() {
    let (fake, store) = start().await;
    let user = UserId::new("student").unwrap();

    store
        .update_progress_field(&user, key(1, 0), true)
        .await
        .unwrap();

    let queries = fake.queries.lock().unwrap().clone();
    assert_eq!(queries.len(), 1);
    assert!(queries[0].contains("updateMask.fieldPaths=progress.%601-0%60"));
    assert!(queries[0].contains("updateMask.fieldPaths=lastUpdated"));

    let progress = store.load_progress(&user).await.unwrap();
    assert!(progress.get(key(1, 0)));
}

#[tokio::test]
async fn save_merges_all_entries() {
    let (_, store) = start().await;
    let user = UserId::new("student").unwrap();

    store
        .update_progress_field(&user, key(1, 0), true)
        .await
        .unwrap();
    let update: ProgressMap = [(key(2, 0), true), (key(2, 1), false)].into_iter().collect();
    store.save_progress(&user, &update).await.unwrap();

    let progress = store.load_progress(&user).await.unwrap();
    assert_eq!(progress.len(), 3);
    assert!(progress.get(key(1, 0)));
    assert!(progress.get(key(2, 0)));
}

#[tokio::test]
async fn user_id_addresses_exactly_one_document() {
    let (fake, store) = start().await;
    let odd = UserId::new("first last?tab=1#x").unwrap();
    let victim = UserId::new("victim").unwrap();

    store
        .update_progress_field(&odd, key(3, 0), true)
        .await
        .unwrap();

    let stored: Vec<String> = fake.docs.lock().unwrap().keys().cloned().collect();
    assert_eq!(stored, vec!["first last?tab=1#x".to_string()]);
    assert!(store.load_progress(&odd).await.unwrap().get(key(3, 0)));
    assert!(store.load_progress(&victim).await.unwrap().is_empty());
}

#[tokio::test]
async fn server_errors_surface_as_connection_errors() {
    let (_, store) = start().await;
    let user = UserId::new("offline").unwrap();

    assert!(matches!(
        store.load_progress(&user).await,
        Err(StorageError::Connection(_))
    ));
    assert!(matches!(
        store.update_progress_field(&user, key(1, 0), true).await,
        Err(StorageError::Connection(_))
    ));
}
