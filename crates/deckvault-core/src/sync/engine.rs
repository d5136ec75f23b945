//! Sync engine: mirrors the remote catalog into the local store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::Instrument;
use uuid::Uuid;

use crate::catalog::CatalogSource;
use crate::db::ApplyOutcome;
use crate::models::{SyncMode, SyncRun, SyncRunStatus};
use crate::services::CardStore;
use crate::Result;

/// Summary of a completed sync run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub run_id: String,
    /// Remote read actually performed (an incremental request on an empty
    /// store runs as `Full`)
    pub mode: SyncMode,
    pub fetched: u64,
    pub applied: u64,
    pub stale: u64,
    pub watermark_before: Option<DateTime<Utc>>,
    pub watermark_after: Option<DateTime<Utc>>,
}

/// Result of a sync request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Another run was in flight; this request was dropped
    AlreadyRunning,
}

impl SyncOutcome {
    pub const fn report(&self) -> Option<&SyncReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::AlreadyRunning => None,
        }
    }
}

/// Pulls catalog rows from a [`CatalogSource`] and applies them to a
/// [`CardStore`].
///
/// At most one run is in flight per engine. Fetching always finishes before
/// the first write, so a failed fetch leaves the store untouched.
pub struct SyncEngine {
    store: CardStore,
    source: Arc<dyn CatalogSource>,
    install_id: String,
    in_flight: AtomicBool,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncEngine")
            .field("install_id", &self.install_id)
            .field("in_flight", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Clears the in-flight flag when the run ends, however it ends.
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Applied {
    fetched: u64,
    outcome: ApplyOutcome,
    watermark_after: Option<DateTime<Utc>>,
}

impl SyncEngine {
    pub fn new(
        store: CardStore,
        source: Arc<dyn CatalogSource>,
        install_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            source,
            install_id: install_id.into(),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &CardStore {
        &self.store
    }

    pub fn install_id(&self) -> &str {
        &self.install_id
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Fetch the whole catalog and apply it.
    pub async fn full_sync(&self) -> Result<SyncOutcome> {
        self.run(SyncMode::Full).await
    }

    /// Fetch only rows changed since the local watermark and apply them.
    ///
    /// An empty store has no watermark; the run then falls back to a full
    /// fetch.
    pub async fn incremental_sync(&self) -> Result<SyncOutcome> {
        self.run(SyncMode::Incremental).await
    }

    /// Entry point for startup and scheduled runs: bootstraps an empty
    /// store with a full fetch, otherwise pulls the delta.
    pub async fn sync(&self) -> Result<SyncOutcome> {
        self.incremental_sync().await
    }

    async fn run(&self, requested: SyncMode) -> Result<SyncOutcome> {
        let Some(_guard) = FlightGuard::acquire(&self.in_flight) else {
            tracing::debug!(
                install_id = %self.install_id,
                requested = %requested,
                "Sync already in flight, dropping request"
            );
            return Ok(SyncOutcome::AlreadyRunning);
        };

        let run_id = Uuid::now_v7().to_string();
        let span = tracing::info_span!(
            "catalog_sync",
            install_id = %self.install_id,
            run_id = %run_id,
        );

        self.run_locked(run_id, requested).instrument(span).await
    }

    async fn run_locked(&self, run_id: String, requested: SyncMode) -> Result<SyncOutcome> {
        let started_at = Utc::now();

        let (mode, watermark_before, result) = match self.store.watermark().await {
            Ok(watermark) => {
                let mode = match (requested, watermark) {
                    (SyncMode::Incremental, Some(_)) => SyncMode::Incremental,
                    _ => SyncMode::Full,
                };
                (mode, watermark, self.fetch_and_apply(mode, watermark).await)
            }
            Err(error) => (requested, None, Err(error)),
        };

        let finished_at = Utc::now();
        match result {
            Ok(applied) => {
                tracing::info!(
                    mode = %mode,
                    fetched = applied.fetched,
                    applied = applied.outcome.applied,
                    stale = applied.outcome.stale,
                    "Catalog sync completed"
                );
                self.record(SyncRun {
                    id: run_id.clone(),
                    install_id: self.install_id.clone(),
                    mode,
                    started_at,
                    finished_at,
                    fetched: applied.fetched,
                    applied: applied.outcome.applied,
                    stale: applied.outcome.stale,
                    status: SyncRunStatus::Succeeded,
                    error: None,
                })
                .await;

                Ok(SyncOutcome::Completed(SyncReport {
                    run_id,
                    mode,
                    fetched: applied.fetched,
                    applied: applied.outcome.applied,
                    stale: applied.outcome.stale,
                    watermark_before,
                    watermark_after: applied.watermark_after,
                }))
            }
            Err(error) => {
                tracing::warn!(
                    mode = %mode,
                    started_at = %started_at,
                    error = %error,
                    "Catalog sync failed"
                );
                self.record(SyncRun {
                    id: run_id,
                    install_id: self.install_id.clone(),
                    mode,
                    started_at,
                    finished_at,
                    fetched: 0,
                    applied: 0,
                    stale: 0,
                    status: SyncRunStatus::Failed,
                    error: Some(error.to_string()),
                })
                .await;

                Err(error)
            }
        }
    }

    async fn fetch_and_apply(
        &self,
        mode: SyncMode,
        watermark: Option<DateTime<Utc>>,
    ) -> Result<Applied> {
        let cards = match (mode, watermark) {
            (SyncMode::Incremental, Some(since)) => self.source.fetch_since(since).await?,
            _ => self.source.fetch_all().await?,
        };
        let fetched = cards.len() as u64;

        if cards.is_empty() {
            return Ok(Applied {
                fetched,
                outcome: ApplyOutcome::default(),
                watermark_after: watermark,
            });
        }

        let outcome = self.store.apply_remote(&cards).await?;
        let watermark_after = self.store.watermark().await?;

        Ok(Applied {
            fetched,
            outcome,
            watermark_after,
        })
    }

    async fn record(&self, run: SyncRun) {
        if let Err(error) = self.store.record_sync_run(&run).await {
            tracing::warn!(run_id = %run.id, error = %error, "Failed to record sync run");
        }
    }
}
