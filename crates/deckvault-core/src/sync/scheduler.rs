//! Periodic background refresh of the local catalog.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::engine::{SyncEngine, SyncOutcome, SyncReport};
use crate::config::SchedulerConfig;
use crate::{Error, Result};

/// Registration state of the background task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Unregistered,
    Registering,
    Registered,
    /// A tick is executing
    Running,
}

/// Result of one scheduled run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Succeeded(SyncReport),
    /// A run was already in flight
    Skipped,
    Failed(String),
}

/// Snapshot of the scheduler for status displays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub task_id: String,
    pub state: SchedulerState,
    pub minimum_interval: Duration,
    pub interval: Duration,
    /// `None` until the first tick completes
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<TickOutcome>,
}

struct Shared {
    state: SchedulerState,
    last_run_at: Option<DateTime<Utc>>,
    last_outcome: Option<TickOutcome>,
    driver: Option<JoinHandle<()>>,
}

struct Inner {
    engine: Arc<SyncEngine>,
    config: SchedulerConfig,
    shared: Mutex<Shared>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(driver) = self.shared.get_mut().driver.take() {
            driver.abort();
        }
    }
}

/// Runs incremental syncs on a fixed period once registered.
///
/// Failed ticks are recorded and the schedule carries on unchanged. Ticks
/// missed while the process was busy or suspended are skipped, not replayed.
#[derive(Clone)]
pub struct BackgroundScheduler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for BackgroundScheduler {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("BackgroundScheduler")
            .field("task_id", &self.inner.config.task_id)
            .field("interval", &self.inner.config.effective_interval())
            .finish_non_exhaustive()
    }
}

impl BackgroundScheduler {
    pub fn new(engine: Arc<SyncEngine>, config: SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                engine,
                config,
                shared: Mutex::new(Shared {
                    state: SchedulerState::Unregistered,
                    last_run_at: None,
                    last_outcome: None,
                    driver: None,
                }),
            }),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.inner.config.task_id
    }

    /// Start the periodic driver. Registering twice is a no-op.
    ///
    /// The first run fires one period after registration.
    pub async fn register(&self) -> Result<SchedulerStatus> {
        let mut shared = self.inner.shared.lock().await;
        if shared.state != SchedulerState::Unregistered {
            tracing::debug!(task_id = %self.task_id(), "Background refresh already registered");
            return Ok(self.inner.snapshot(&shared));
        }

        shared.state = SchedulerState::Registering;
        let period = self.inner.config.effective_interval();
        if period.is_zero() {
            shared.state = SchedulerState::Unregistered;
            return Err(Error::Config(
                "background refresh interval must be positive".to_string(),
            ));
        }

        shared.driver = Some(tokio::spawn(drive(Arc::downgrade(&self.inner), period)));
        shared.state = SchedulerState::Registered;
        tracing::info!(
            task_id = %self.task_id(),
            interval_secs = period.as_secs(),
            "Registered background catalog refresh"
        );

        Ok(self.inner.snapshot(&shared))
    }

    /// Stop the periodic driver. A tick already executing runs to completion.
    pub async fn unregister(&self) {
        let mut shared = self.inner.shared.lock().await;
        if let Some(driver) = shared.driver.take() {
            driver.abort();
        }
        if shared.state != SchedulerState::Unregistered {
            tracing::info!(task_id = %self.task_id(), "Unregistered background catalog refresh");
        }
        shared.state = SchedulerState::Unregistered;
    }

    /// Run one refresh now. Used by the driver, and by hosts whose own
    /// background callback fires instead.
    pub async fn tick(&self) -> TickOutcome {
        self.inner.tick().await
    }

    pub async fn status(&self) -> SchedulerStatus {
        let shared = self.inner.shared.lock().await;
        self.inner.snapshot(&shared)
    }
}

impl Inner {
    fn snapshot(&self, shared: &Shared) -> SchedulerStatus {
        SchedulerStatus {
            task_id: self.config.task_id.clone(),
            state: shared.state,
            minimum_interval: self.config.minimum_interval,
            interval: self.config.effective_interval(),
            last_run_at: shared.last_run_at,
            last_outcome: shared.last_outcome.clone(),
        }
    }

    async fn tick(&self) -> TickOutcome {
        {
            let mut shared = self.shared.lock().await;
            match shared.state {
                SchedulerState::Running | SchedulerState::Registering => {
                    return TickOutcome::Skipped;
                }
                SchedulerState::Registered => shared.state = SchedulerState::Running,
                SchedulerState::Unregistered => {}
            }
        }
        tracing::debug!(task_id = %self.config.task_id, "Background refresh tick");

        let outcome = match self.engine.sync().await {
            Ok(SyncOutcome::Completed(report)) => TickOutcome::Succeeded(report),
            Ok(SyncOutcome::AlreadyRunning) => TickOutcome::Skipped,
            Err(error) => {
                tracing::warn!(
                    task_id = %self.config.task_id,
                    error = %error,
                    "Background refresh failed"
                );
                TickOutcome::Failed(error.to_string())
            }
        };

        let mut shared = self.shared.lock().await;
        if shared.state == SchedulerState::Running {
            shared.state = SchedulerState::Registered;
        }
        if outcome != TickOutcome::Skipped {
            shared.last_run_at = Some(Utc::now());
        }
        shared.last_outcome = Some(outcome.clone());

        outcome
    }
}

async fn drive(inner: Weak<Inner>, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        // Detached so aborting the driver never cancels a run mid-transaction.
        let run = tokio::spawn(async move { inner.tick().await });
        if let Err(error) = run.await {
            tracing::warn!(error = %error, "Background refresh task aborted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSource;
    use crate::services::CardStore;
    use crate::sync::testing::{at, remote_card, FakeCatalog};
    use pretty_assertions::assert_eq;

    async fn scheduler_with(catalog: &Arc<FakeCatalog>, config: SchedulerConfig) -> BackgroundScheduler {
        let store = CardStore::open_in_memory().await.unwrap();
        let source: Arc<dyn CatalogSource> = catalog.clone();
        let engine = Arc::new(SyncEngine::new(store, source, "1740000000000-abc123xyz"));
        BackgroundScheduler::new(engine, config)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn status_before_any_run_reports_unknown_last_run() {
        let scheduler = scheduler_with(&FakeCatalog::with_cards(vec![]), SchedulerConfig::default()).await;

        let status = scheduler.status().await;

        assert_eq!(status.task_id, "deckvault.catalog-refresh");
        assert_eq!(status.state, SchedulerState::Unregistered);
        assert_eq!(status.minimum_interval, Duration::from_secs(15 * 60));
        assert_eq!(status.last_run_at, None);
        assert_eq!(status.last_outcome, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn register_is_idempotent() {
        let scheduler = scheduler_with(&FakeCatalog::with_cards(vec![]), SchedulerConfig::default()).await;

        let first = scheduler.register().await.unwrap();
        let second = scheduler.register().await.unwrap();

        assert_eq!(first.state, SchedulerState::Registered);
        assert_eq!(second.state, SchedulerState::Registered);

        scheduler.unregister().await;
        assert_eq!(scheduler.status().await.state, SchedulerState::Unregistered);
        assert_eq!(
            scheduler.register().await.unwrap().state,
            SchedulerState::Registered
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn interval_below_floor_is_clamped() {
        let config = SchedulerConfig {
            interval: Duration::from_secs(60),
            ..SchedulerConfig::default()
        };
        let scheduler = scheduler_with(&FakeCatalog::with_cards(vec![]), config).await;

        assert_eq!(scheduler.status().await.interval, Duration::from_secs(15 * 60));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn zero_interval_is_rejected() {
        let config = SchedulerConfig {
            interval: Duration::ZERO,
            minimum_interval: Duration::ZERO,
            ..SchedulerConfig::default()
        };
        let scheduler = scheduler_with(&FakeCatalog::with_cards(vec![]), config).await;

        assert!(matches!(scheduler.register().await, Err(Error::Config(_))));
        assert_eq!(scheduler.status().await.state, SchedulerState::Unregistered);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn successful_tick_records_outcome_and_returns_to_registered() {
        let catalog = FakeCatalog::with_cards(vec![remote_card("A-1", Some(1.0), at(1))]);
        let scheduler = scheduler_with(&catalog, SchedulerConfig::default()).await;
        scheduler.register().await.unwrap();

        let outcome = scheduler.tick().await;

        let TickOutcome::Succeeded(report) = &outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(report.applied, 1);
        let status = scheduler.status().await;
        assert_eq!(status.state, SchedulerState::Registered);
        assert!(status.last_run_at.is_some());
        assert_eq!(status.last_outcome, Some(outcome));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_tick_does_not_halt_the_schedule() {
        let catalog = FakeCatalog::with_cards(vec![remote_card("A-1", Some(1.0), at(1))]);
        let scheduler = scheduler_with(&catalog, SchedulerConfig::default()).await;
        scheduler.register().await.unwrap();

        catalog.set_failing(true);
        let failed = scheduler.tick().await;
        assert!(matches!(failed, TickOutcome::Failed(ref message) if message.contains("catalog unreachable")));
        assert_eq!(scheduler.status().await.state, SchedulerState::Registered);

        catalog.set_failing(false);
        assert!(matches!(scheduler.tick().await, TickOutcome::Succeeded(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn driver_fires_after_one_period() {
        let catalog = FakeCatalog::with_cards(vec![remote_card("A-1", Some(1.0), at(1))]);
        let scheduler = scheduler_with(&catalog, SchedulerConfig::default()).await;
        scheduler.register().await.unwrap();

        tokio::time::sleep(Duration::from_secs(14 * 60)).await;
        assert_eq!(scheduler.status().await.last_run_at, None);

        for _ in 0..600 {
            if scheduler.status().await.last_run_at.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        let status = scheduler.status().await;
        assert!(status.last_run_at.is_some());
        assert!(matches!(status.last_outcome, Some(TickOutcome::Succeeded(_))));
    }
}
