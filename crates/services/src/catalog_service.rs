use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use course_core::model::ResourceCatalog;
use reqwest::Client;
use tracing::debug;

use crate::cache::ResourceCache;
use crate::error::CatalogError;

const CATALOG_CACHE_KEY: &str = "resource-catalog";

/// Where the weekly resource catalog comes from.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch the full catalog.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the catalog cannot be fetched or parsed.
    async fn fetch_catalog(&self) -> Result<ResourceCatalog, CatalogError>;
}

/// Catalog stored as a JSON array on disk.
#[derive(Debug, Clone)]
pub struct FileCatalogSource {
    path: PathBuf,
}

impl FileCatalogSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogSource for FileCatalogSource {
    async fn fetch_catalog(&self) -> Result<ResourceCatalog, CatalogError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Catalog published as JSON at an HTTP(S) URL.
#[derive(Debug, Clone)]
pub struct HttpCatalogSource {
    client: Client,
    url: String,
}

impl HttpCatalogSource {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch_catalog(&self) -> Result<ResourceCatalog, CatalogError> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(CatalogError::HttpStatus(response.status()));
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Serves the catalog through the shared resource cache.
#[derive(Clone)]
pub struct CatalogService {
    source: Arc<dyn CatalogSource>,
    cache: Arc<ResourceCache<ResourceCatalog>>,
}

impl CatalogService {
    #[must_use]
    pub fn new(source: Arc<dyn CatalogSource>, cache: Arc<ResourceCache<ResourceCatalog>>) -> Self {
        Self { source, cache }
    }

    /// Cached catalog, fetching it when missing or expired.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if a fetch is needed and fails.
    pub async fn catalog(&self) -> Result<ResourceCatalog, CatalogError> {
        if let Some(catalog) = self.cache.get(CATALOG_CACHE_KEY) {
            return Ok(catalog);
        }
        self.refresh().await
    }

    /// Fetch the catalog regardless of the cache and store the result.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the fetch fails; the previous cache entry is dropped.
    pub async fn refresh(&self) -> Result<ResourceCatalog, CatalogError> {
        self.cache.invalidate(CATALOG_CACHE_KEY);
        let catalog = self.source.fetch_catalog().await?;
        debug!(weeks = catalog.weeks().len(), "fetched resource catalog");
        self.cache.insert(CATALOG_CACHE_KEY, catalog.clone());
        Ok(catalog)
    }
}
