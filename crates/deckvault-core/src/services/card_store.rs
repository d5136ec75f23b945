//! Shared card store wrapper used across shells.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::db::{
    ApplyOutcome, CardRepository, Database, LibSqlCardRepository, LibSqlSettingsRepository,
    LibSqlSyncRunRepository, SettingsRepository, SyncRunRepository,
};
use crate::models::{Card, CardFilter, SyncRun};
use crate::Result;

/// Thread-safe handle to the local catalog mirror.
///
/// Cloning shares the same underlying connection; all access is serialised.
#[derive(Clone)]
pub struct CardStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl std::fmt::Debug for CardStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("CardStore")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl CardStore {
    /// Open (creating if needed) and migrate the store at the given path.
    ///
    /// Idempotent; safe to call on every start.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                crate::Error::StorageInit(format!("{}: {error}", parent.display()))
            })?;
        }

        let db = Database::open(&db_path).await?;
        tracing::debug!("Opened card store at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Filesystem location, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Insert or replace cards by id in one transaction; returns rows applied.
    pub async fn upsert_many(&self, cards: &[Card]) -> Result<u64> {
        let db = self.db.lock().await;
        let repo = LibSqlCardRepository::new(db.connection());
        repo.upsert_many(cards).await
    }

    /// Apply a remote batch in one transaction without regressing `updated_at`.
    pub async fn apply_remote(&self, cards: &[Card]) -> Result<ApplyOutcome> {
        let db = self.db.lock().await;
        let repo = LibSqlCardRepository::new(db.connection());
        repo.apply_newer(cards).await
    }

    /// All cards, ordered by set then name.
    pub async fn query_all(&self) -> Result<Vec<Card>> {
        self.query_by_filter(&CardFilter::default()).await
    }

    /// Cards matching `filter`.
    pub async fn query_by_filter(&self, filter: &CardFilter) -> Result<Vec<Card>> {
        let db = self.db.lock().await;
        let repo = LibSqlCardRepository::new(db.connection());
        repo.list(filter).await
    }

    /// Fetch a card by id.
    pub async fn get(&self, id: &str) -> Result<Option<Card>> {
        let db = self.db.lock().await;
        let repo = LibSqlCardRepository::new(db.connection());
        repo.get(id).await
    }

    /// Number of stored cards.
    pub async fn count(&self) -> Result<u64> {
        let db = self.db.lock().await;
        let repo = LibSqlCardRepository::new(db.connection());
        repo.count().await
    }

    /// Sync watermark: the newest `updated_at` stored, `None` when empty.
    pub async fn watermark(&self) -> Result<Option<DateTime<Utc>>> {
        let db = self.db.lock().await;
        let repo = LibSqlCardRepository::new(db.connection());
        repo.watermark().await
    }

    /// Read a local setting.
    pub async fn setting(&self, key: &str) -> Result<Option<String>> {
        let db = self.db.lock().await;
        let repo = LibSqlSettingsRepository::new(db.connection());
        repo.get(key).await
    }

    /// Store `value` under `key` unless a value already exists; returns the stored value.
    pub async fn setting_or_insert(&self, key: &str, value: &str) -> Result<String> {
        let db = self.db.lock().await;
        let repo = LibSqlSettingsRepository::new(db.connection());
        repo.get_or_insert(key, value).await
    }

    /// Append a finished sync run to the log.
    pub async fn record_sync_run(&self, run: &SyncRun) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncRunRepository::new(db.connection());
        repo.record(run).await
    }

    /// Most recent sync run.
    pub async fn last_sync_run(&self) -> Result<Option<SyncRun>> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncRunRepository::new(db.connection());
        repo.latest().await
    }

    /// Recent sync runs, newest first.
    pub async fn list_sync_runs(&self, limit: usize) -> Result<Vec<SyncRun>> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncRunRepository::new(db.connection());
        repo.list(limit).await
    }
}
