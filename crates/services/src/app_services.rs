use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use course_core::model::{ResourceCatalog, UserId};
use storage::LocalProgressStore;
use storage::firestore::FirestoreRemoteStore;
use storage::repository::Storage;
use tracing::info;

use crate::cache::{DEFAULT_CLEANUP_INTERVAL, ResourceCache};
use crate::catalog_service::{CatalogService, CatalogSource, FileCatalogSource, HttpCatalogSource};
use crate::config::{AppConfig, CatalogLocation};
use crate::error::{AppServicesError, CatalogError};
use crate::sync::{ProgressSyncService, RetryWorker, SyncResult};

/// Assembles the progress subsystem and owns its background tasks.
///
/// Nothing here is global: dropping (or [`AppServices::shutdown`]) stops the
/// retry worker and the cache cleanup task.
pub struct AppServices {
    sync: Arc<ProgressSyncService>,
    cache: Arc<ResourceCache<ResourceCatalog>>,
    catalog: Option<CatalogService>,
    retry_interval: Duration,
    retry_worker: Mutex<Option<RetryWorker>>,
}

impl AppServices {
    /// Build services backed by `SQLite`, with Firestore as the remote store when
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new(config: &AppConfig) -> Result<Self, AppServicesError> {
        let mut storage = Storage::sqlite(&config.db_url).await?;
        if let Some(firestore) = &config.firestore {
            info!(project = %firestore.project_id, "using firestore for remote progress");
            storage = storage.with_remote(Arc::new(FirestoreRemoteStore::new(firestore.clone())));
        }

        let source: Option<Arc<dyn CatalogSource>> =
            config.catalog.as_ref().map(|location| match location {
                CatalogLocation::File(path) => {
                    Arc::new(FileCatalogSource::new(path.clone())) as Arc<dyn CatalogSource>
                }
                CatalogLocation::Url(url) => Arc::new(HttpCatalogSource::new(url.clone())),
            });

        Ok(Self::from_parts(storage, source, config))
    }

    /// Build services over already-constructed storage and catalog source.
    ///
    /// Must be called inside a tokio runtime; the cache cleanup task starts here.
    #[must_use]
    pub fn from_parts(
        storage: Storage,
        catalog_source: Option<Arc<dyn CatalogSource>>,
        config: &AppConfig,
    ) -> Self {
        let sync = Arc::new(ProgressSyncService::new(
            LocalProgressStore::new(Arc::clone(&storage.local)),
            Arc::clone(&storage.remote),
        ));
        let cache = Arc::new(ResourceCache::new(config.cache_ttl));
        cache.start_cleanup(DEFAULT_CLEANUP_INTERVAL);
        let catalog =
            catalog_source.map(|source| CatalogService::new(source, Arc::clone(&cache)));

        Self {
            sync,
            cache,
            catalog,
            retry_interval: config.retry_interval,
            retry_worker: Mutex::new(None),
        }
    }

    /// Sign `user` in (or go anonymous with `None`) and load their progress.
    ///
    /// Signed-in sessions get a retry worker; anonymous sessions have nothing to
    /// retry and run without one.
    pub async fn start_session(&self, user: Option<UserId>) -> SyncResult {
        let signed_in = user.is_some();
        let outcome = self.sync.initialize(user).await;
        let mut worker = self.worker_slot();
        *worker =
            signed_in.then(|| RetryWorker::spawn(Arc::clone(&self.sync), self.retry_interval));
        outcome
    }

    /// Sign out: stop retrying and reload anonymous progress.
    pub async fn end_session(&self) -> SyncResult {
        self.stop_retry_worker();
        self.sync.initialize(None).await
    }

    /// Stop background work and release cached resources.
    pub fn shutdown(&self) {
        self.stop_retry_worker();
        self.cache.dispose();
    }

    #[must_use]
    pub fn sync(&self) -> Arc<ProgressSyncService> {
        Arc::clone(&self.sync)
    }

    #[must_use]
    pub fn cache(&self) -> Arc<ResourceCache<ResourceCatalog>> {
        Arc::clone(&self.cache)
    }

    #[must_use]
    pub fn is_retrying(&self) -> bool {
        self.worker_slot()
            .as_ref()
            .is_some_and(RetryWorker::is_running)
    }

    /// The configured catalog, or an empty one when no source is configured.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the configured source cannot be fetched.
    pub async fn catalog(&self) -> Result<ResourceCatalog, CatalogError> {
        match &self.catalog {
            Some(service) => service.catalog().await,
            None => Ok(ResourceCatalog::default()),
        }
    }

    fn stop_retry_worker(&self) {
        if let Some(worker) = self.worker_slot().take() {
            worker.stop();
        }
    }

    fn worker_slot(&self) -> MutexGuard<'_, Option<RetryWorker>> {
        self.retry_worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for AppServices {
    fn drop(&mut self) {
        self.shutdown();
    }
}
