#![forbid(unsafe_code)]

pub mod app_services;
pub mod cache;
pub mod catalog_service;
pub mod config;
pub mod error;
pub mod logging;
pub mod sync;

pub use course_core::Clock;

pub use app_services::AppServices;
pub use cache::ResourceCache;
pub use catalog_service::{CatalogService, CatalogSource, FileCatalogSource, HttpCatalogSource};
pub use config::{AppConfig, CatalogLocation};
pub use error::{AppServicesError, CatalogError, ConfigError};
pub use logging::{Verbosity, init_logging};
pub use sync::{ProgressSyncService, RetryWorker, SyncIssue, SyncPhase, SyncResult};
