use std::env;
use std::path::PathBuf;
use std::time::Duration;

use course_core::model::UserId;
use storage::firestore::FirestoreConfig;

use crate::cache::DEFAULT_CACHE_TTL;
use crate::error::ConfigError;
use crate::sync::DEFAULT_RETRY_INTERVAL;

pub const DEFAULT_DB_URL: &str = "sqlite://course.sqlite3";

/// Where the resource catalog is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogLocation {
    File(PathBuf),
    Url(String),
}

impl CatalogLocation {
    /// `http://` and `https://` values are URLs, anything else a file path.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Self::Url(raw.to_owned())
        } else {
            Self::File(PathBuf::from(raw))
        }
    }
}

/// Runtime settings for [`crate::AppServices`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_url: String,
    pub catalog: Option<CatalogLocation>,
    pub user: Option<UserId>,
    pub retry_interval: Duration,
    pub cache_ttl: Duration,
    pub firestore: Option<FirestoreConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_url: DEFAULT_DB_URL.to_owned(),
            catalog: None,
            user: None,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            cache_ttl: DEFAULT_CACHE_TTL,
            firestore: None,
        }
    }
}

impl AppConfig {
    /// Read `COURSE_*` variables, falling back to defaults for unset ones.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a set variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::from_lookup(|name| env::var(name).ok())?;
        config.firestore = FirestoreConfig::from_env();
        Ok(config)
    }

    /// Build from an arbitrary variable lookup. Firestore settings are left unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a present value cannot be parsed.
    pub fn from_lookup(
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let get = |name| lookup(name).filter(|v: &String| !v.trim().is_empty());
        let defaults = Self::default();

        let user = match get("COURSE_USER") {
            Some(raw) => Some(
                UserId::new(raw.trim())
                    .map_err(|_| ConfigError::InvalidUser { name: "COURSE_USER" })?,
            ),
            None => None,
        };

        Ok(Self {
            db_url: get("COURSE_DB_URL").unwrap_or(defaults.db_url),
            catalog: get("COURSE_CATALOG").map(|raw| CatalogLocation::parse(raw.trim())),
            user,
            retry_interval: seconds(
                "COURSE_RETRY_INTERVAL_SECS",
                get("COURSE_RETRY_INTERVAL_SECS"),
                defaults.retry_interval,
            )?,
            cache_ttl: seconds(
                "COURSE_CACHE_TTL_SECS",
                get("COURSE_CACHE_TTL_SECS"),
                defaults.cache_ttl,
            )?,
            firestore: None,
        })
    }
}

fn seconds(
    name: &'static str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidSeconds { name, raw }),
    }
}
