use course_core::Clock;
use course_core::model::{MaterialId, ProgressKey, ProgressMap, UserId, WeekId};
use course_core::time::fixed_now;
use storage::LocalProgressStore;
use storage::local::SHARED_PROGRESS_KEY;
use storage::repository::{KeyValueStore, RemoteProgressStore};
use storage::sqlite::SqliteRepository;

fn key(week: u32, material: u64) -> ProgressKey {
    ProgressKey::new(WeekId::number(week), MaterialId::new(material))
}

async fn repo(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url)
        .await
        .expect("connect")
        .with_clock(Clock::fixed(fixed_now()));
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = repo("memdb_migrate_twice").await;
    repo.migrate().await.expect("second migrate");
}

#[tokio::test]
async fn update_field_creates_then_patches_document() {
    let repo = repo("memdb_update_field").await;
    let user = UserId::new("student-a").unwrap();

    repo.update_progress_field(&user, key(1, 0), true)
        .await
        .unwrap();
    repo.update_progress_field(&user, key(1, 1), true)
        .await
        .unwrap();
    repo.update_progress_field(&user, key(1, 0), false)
        .await
        .unwrap();

    let doc = repo.progress_document(&user).await.unwrap().expect("doc");
    assert!(!doc.progress.get(key(1, 0)));
    assert!(doc.progress.get(key(1, 1)));
    assert_eq!(doc.progress.len(), 2);
    assert_eq!(doc.last_updated, fixed_now());
}

#[tokio::test]
async fn save_merges_with_existing_document() {
    let repo = repo("memdb_save_merge").await;
    let user = UserId::new("student-b").unwrap();

    repo.update_progress_field(&user, ProgressKey::new(WeekId::Misc, MaterialId::new(3)), true)
        .await
        .unwrap();

    let update: ProgressMap = [(key(2, 0), true), (key(2, 1), false)].into_iter().collect();
    repo.save_progress(&user, &update).await.unwrap();

    let progress = repo.load_progress(&user).await.unwrap();
    assert_eq!(progress.len(), 3);
    assert!(progress.is_completed(WeekId::Misc, MaterialId::new(3)));
    assert!(progress.get(key(2, 0)));
    assert!(!progress.get(key(2, 1)));
}

#[tokio::test]
async fn missing_document_loads_empty() {
    let repo = repo("memdb_missing_doc").await;
    let user = UserId::new("nobody").unwrap();
    assert!(repo.load_progress(&user).await.unwrap().is_empty());
    assert!(repo.progress_document(&user).await.unwrap().is_none());
}

#[tokio::test]
async fn local_store_persists_in_key_value_table() {
    let repo = repo("memdb_local_kv").await;
    let local = LocalProgressStore::new(std::sync::Arc::new(repo.clone()));

    local
        .save(WeekId::number(3), MaterialId::new(2), true, None)
        .await
        .unwrap();

    let raw = repo.get_value(SHARED_PROGRESS_KEY).await.unwrap();
    assert_eq!(raw.as_deref(), Some(r#"{"3-2":true}"#));

    let user = UserId::new("student-c").unwrap();
    let loaded = local.load(Some(&user)).await.unwrap();
    assert!(loaded.is_completed(WeekId::number(3), MaterialId::new(2)));

    repo.remove_value(SHARED_PROGRESS_KEY).await.unwrap();
    assert!(local.load(None).await.unwrap().is_empty());
}
