//! Typed runtime configuration.
//!
//! Shells build an [`AppConfig`] once at startup (from a JSON file, the
//! environment, or flags) and pass the pieces explicitly into the store,
//! the remote catalog client and the scheduler. Nothing in this crate reads
//! process environment on its own.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

pub const ENV_CATALOG_URL: &str = "DECKVAULT_CATALOG_URL";
pub const ENV_CATALOG_KEY: &str = "DECKVAULT_CATALOG_KEY";
pub const ENV_CATALOG_TABLE: &str = "DECKVAULT_CATALOG_TABLE";
pub const ENV_PAGE_SIZE: &str = "DECKVAULT_PAGE_SIZE";
pub const ENV_SYNC_INTERVAL_SECS: &str = "DECKVAULT_SYNC_INTERVAL_SECS";
pub const ENV_DB_PATH: &str = "DECKVAULT_DB_PATH";

const DEFAULT_TABLE: &str = "cards";
const DEFAULT_PAGE_SIZE: usize = 1000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;
const DEFAULT_TASK_ID: &str = "deckvault.catalog-refresh";
/// Shortest period mobile hosts grant to periodic background work.
const PLATFORM_MINIMUM_INTERVAL_SECS: u64 = 15 * 60;

/// Remote catalog endpoint settings.
///
/// `api_key` is the public read-only key; write credentials never belong here.
#[derive(Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`
    pub base_url: String,
    pub api_key: String,
    /// Catalog table name
    pub table: String,
    /// Rows requested per page
    pub page_size: usize,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for CatalogConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("CatalogConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("table", &self.table)
            .field("page_size", &self.page_size)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl CatalogConfig {
    /// Create a configuration with default table, page size and timeout.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            table: DEFAULT_TABLE.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    #[must_use]
    pub const fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Keep this endpoint and key but take table, page size and timeout
    /// from `base`.
    #[must_use]
    pub fn with_options_of(self, base: Self) -> Self {
        self.with_table(base.table)
            .with_page_size(base.page_size)
            .with_request_timeout(base.request_timeout)
    }

    /// Check that the configuration can be used to build a client.
    pub fn validate(&self) -> Result<()> {
        if !is_http_url(self.base_url.trim()) {
            return Err(Error::Config(
                "catalog URL must include http:// or https://".to_string(),
            ));
        }
        if self.api_key.trim().is_empty() {
            return Err(Error::Config("catalog API key must not be empty".to_string()));
        }
        if self.table.trim().is_empty() {
            return Err(Error::Config("catalog table must not be empty".to_string()));
        }
        if self.page_size == 0 {
            return Err(Error::Config("page size must be positive".to_string()));
        }
        Ok(())
    }
}

/// Background refresh settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Whether startup should register the periodic refresh
    pub enabled: bool,
    /// Host task identifier, registered once per install
    pub task_id: String,
    /// Requested period between refreshes
    pub interval: Duration,
    /// Host-imposed floor on `interval`
    pub minimum_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            task_id: DEFAULT_TASK_ID.to_string(),
            interval: Duration::from_secs(PLATFORM_MINIMUM_INTERVAL_SECS),
            minimum_interval: Duration::from_secs(PLATFORM_MINIMUM_INTERVAL_SECS),
        }
    }
}

impl SchedulerConfig {
    /// The period actually used: the requested interval clamped to the floor.
    pub fn effective_interval(&self) -> Duration {
        self.interval.max(self.minimum_interval)
    }
}

/// Complete shell configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    /// `None` runs offline against the existing local mirror
    pub catalog: Option<CatalogConfig>,
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    /// Local-only configuration at `db_path`.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            catalog: None,
            scheduler: SchedulerConfig::default(),
        }
    }

    /// Overlay settings read through `lookup` (typically `std::env::var`).
    ///
    /// Setting only one of the catalog URL and key is an error.
    pub fn apply_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |key: &str| normalize_text_option(lookup(key));

        if let Some(path) = read(ENV_DB_PATH) {
            self.db_path = PathBuf::from(path);
        }

        match (read(ENV_CATALOG_URL), read(ENV_CATALOG_KEY)) {
            (Some(url), Some(key)) => {
                let catalog = CatalogConfig::new(url, key);
                self.catalog = Some(match self.catalog.take() {
                    Some(base) => catalog.with_options_of(base),
                    None => catalog,
                });
            }
            (None, None) => {}
            _ => {
                return Err(Error::Config(format!(
                    "both {ENV_CATALOG_URL} and {ENV_CATALOG_KEY} must be set"
                )));
            }
        }

        if let Some(catalog) = self.catalog.as_mut() {
            if let Some(table) = read(ENV_CATALOG_TABLE) {
                catalog.table = table;
            }
            if let Some(page_size) = read(ENV_PAGE_SIZE) {
                catalog.page_size = parse_number(ENV_PAGE_SIZE, &page_size)?;
            }
        }

        if let Some(secs) = read(ENV_SYNC_INTERVAL_SECS) {
            self.scheduler.interval = Duration::from_secs(parse_number(ENV_SYNC_INTERVAL_SECS, &secs)?);
        }

        if let Some(catalog) = &self.catalog {
            catalog.validate()?;
        }
        Ok(self)
    }

    /// Overlay settings from a JSON config file; a missing file changes nothing.
    pub fn apply_file(mut self, path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(self);
        }

        let raw = std::fs::read_to_string(path)?;
        let file = serde_json::from_str::<ConfigFile>(&raw).map_err(|error| {
            Error::Config(format!("failed to parse {}: {error}", path.display()))
        })?;

        if let Some(db_path) = file.db_path {
            self.db_path = db_path;
        }
        if let Some(catalog) = file.catalog {
            let mut config = CatalogConfig::new(catalog.url, catalog.api_key);
            if let Some(table) = normalize_text_option(catalog.table) {
                config = config.with_table(table);
            }
            if let Some(page_size) = catalog.page_size {
                config = config.with_page_size(page_size);
            }
            if let Some(secs) = catalog.request_timeout_secs {
                config = config.with_request_timeout(Duration::from_secs(secs));
            }
            config.validate()?;
            self.catalog = Some(config);
        }
        if let Some(scheduler) = file.scheduler {
            if let Some(enabled) = scheduler.enabled {
                self.scheduler.enabled = enabled;
            }
            if let Some(task_id) = normalize_text_option(scheduler.task_id) {
                self.scheduler.task_id = task_id;
            }
            if let Some(secs) = scheduler.interval_secs {
                self.scheduler.interval = Duration::from_secs(secs);
            }
        }
        Ok(self)
    }
}

/// On-disk JSON shape of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub catalog: Option<CatalogFileSection>,
    #[serde(default)]
    pub scheduler: Option<SchedulerFileSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CatalogFileSection {
    pub url: String,
    pub api_key: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SchedulerFileSection {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub interval_secs: Option<u64>,
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("{key} must be a positive integer, got '{value}'")))
}
