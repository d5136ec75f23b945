//! Application startup: open the mirror, identify the install, run a first
//! sync and register the background refresh, in that order.

use std::sync::Arc;

use crate::catalog::{CatalogSource, RemoteCatalogClient};
use crate::config::AppConfig;
use crate::identity::InstallIdentity;
use crate::notify::{Notifier, Severity};
use crate::services::CardStore;
use crate::sync::{BackgroundScheduler, SyncEngine, SyncOutcome, SyncReport};

/// Whether the local store could be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreStatus {
    Ready,
    Unavailable(String),
}

/// What happened to the sync run at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitialSync {
    Completed(SyncReport),
    /// No remote catalog configured, or the store was unavailable
    NotAttempted,
    AlreadyRunning,
    /// The app is usable against the existing mirror, which may be stale
    Failed(String),
}

/// Handles the host keeps for the lifetime of the app
#[derive(Debug, Clone)]
pub struct Services {
    pub store: CardStore,
    pub install_id: String,
    /// `None` when no remote catalog is configured
    pub engine: Option<Arc<SyncEngine>>,
    /// `None` when disabled or registration failed
    pub scheduler: Option<BackgroundScheduler>,
}

#[derive(Debug)]
pub struct StartupReport {
    pub store_status: StoreStatus,
    pub initial_sync: InitialSync,
    /// `None` when the store is unavailable
    pub services: Option<Services>,
}

impl StartupReport {
    fn unavailable(reason: String) -> Self {
        Self {
            store_status: StoreStatus::Unavailable(reason),
            initial_sync: InitialSync::NotAttempted,
            services: None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        !matches!(
            (&self.store_status, &self.initial_sync),
            (
                StoreStatus::Ready,
                InitialSync::Completed(_) | InitialSync::NotAttempted | InitialSync::AlreadyRunning
            )
        )
    }
}

/// Start against the remote catalog described by `config`.
pub async fn start(config: &AppConfig, notifier: &dyn Notifier) -> StartupReport {
    let source = match config.catalog.as_ref().map(RemoteCatalogClient::new) {
        Some(Ok(client)) => Some(Arc::new(client) as Arc<dyn CatalogSource>),
        Some(Err(error)) => {
            tracing::warn!(error = %error, "Remote catalog disabled");
            notifier.show(&format!("Catalog sync disabled: {error}"), Severity::Warning);
            None
        }
        None => None,
    };

    start_with_source(config, source, notifier).await
}

/// Start with an explicit catalog source (or none, for offline use).
pub async fn start_with_source(
    config: &AppConfig,
    source: Option<Arc<dyn CatalogSource>>,
    notifier: &dyn Notifier,
) -> StartupReport {
    let store = match CardStore::open_path(&config.db_path).await {
        Ok(store) => store,
        Err(error) => {
            tracing::error!(
                path = %config.db_path.display(),
                error = %error,
                "Local card store unavailable"
            );
            notifier.show(
                &format!("Local card storage could not be opened: {error}"),
                Severity::Error,
            );
            return StartupReport::unavailable(error.to_string());
        }
    };

    let install_id = match InstallIdentity::new(store.clone()).install_id().await {
        Ok(install_id) => install_id,
        Err(error) => {
            tracing::error!(error = %error, "Failed to resolve install id");
            notifier.show(
                &format!("Local card storage is not usable: {error}"),
                Severity::Error,
            );
            return StartupReport::unavailable(error.to_string());
        }
    };

    let Some(source) = source else {
        tracing::info!(install_id = %install_id, "Starting offline, no remote catalog");
        return StartupReport {
            store_status: StoreStatus::Ready,
            initial_sync: InitialSync::NotAttempted,
            services: Some(Services {
                store,
                install_id,
                engine: None,
                scheduler: None,
            }),
        };
    };

    let engine = Arc::new(SyncEngine::new(store.clone(), source, install_id.clone()));

    let initial_sync = match engine.sync().await {
        Ok(SyncOutcome::Completed(report)) => InitialSync::Completed(report),
        Ok(SyncOutcome::AlreadyRunning) => InitialSync::AlreadyRunning,
        Err(error) => {
            tracing::warn!(error = %error, "Initial sync failed, continuing with local data");
            InitialSync::Failed(error.to_string())
        }
    };

    let scheduler = if config.scheduler.enabled {
        let scheduler = BackgroundScheduler::new(Arc::clone(&engine), config.scheduler.clone());
        match scheduler.register().await {
            Ok(_) => Some(scheduler),
            Err(error) => {
                tracing::warn!(error = %error, "Background refresh not registered");
                None
            }
        }
    } else {
        None
    };

    StartupReport {
        store_status: StoreStatus::Ready,
        initial_sync,
        services: Some(Services {
            store,
            install_id,
            engine: Some(engine),
            scheduler,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CatalogConfig;
    use crate::notify::testing::RecordingNotifier;
    use crate::sync::testing::{at, remote_card, FakeCatalog};
    use crate::sync::SchedulerState;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn start_syncs_and_registers_scheduler() {
        let tmp = tempdir().unwrap();
        let config = AppConfig::new(tmp.path().join("deckvault.db"));
        let catalog = FakeCatalog::with_cards(vec![remote_card("A-1", None, at(1))]);
        let notifier = RecordingNotifier::default();

        let report = start_with_source(&config, Some(catalog.clone()), &notifier).await;

        assert_eq!(report.store_status, StoreStatus::Ready);
        assert!(matches!(&report.initial_sync, InitialSync::Completed(sync) if sync.applied == 1));
        assert!(!report.is_degraded());
        let services = report.services.unwrap();
        assert_eq!(services.store.count().await.unwrap(), 1);
        let scheduler = services.scheduler.unwrap();
        assert_eq!(scheduler.status().await.state, SchedulerState::Registered);
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_initial_sync_is_degraded_but_usable() {
        let tmp = tempdir().unwrap();
        let mut config = AppConfig::new(tmp.path().join("deckvault.db"));
        config.scheduler.enabled = false;
        let catalog = FakeCatalog::with_cards(vec![]);
        catalog.set_failing(true);
        let notifier = RecordingNotifier::default();

        let report = start_with_source(&config, Some(catalog.clone()), &notifier).await;

        assert_eq!(report.store_status, StoreStatus::Ready);
        assert!(matches!(report.initial_sync, InitialSync::Failed(_)));
        assert!(report.is_degraded());
        let services = report.services.unwrap();
        assert!(services.engine.is_some());
        assert!(services.scheduler.is_none());
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unusable_store_stops_startup_and_notifies() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("deckvault.db");
        std::fs::write(&db_path, vec![0x42_u8; 8192]).unwrap();
        let catalog = FakeCatalog::with_cards(vec![remote_card("A-1", None, at(1))]);
        let notifier = RecordingNotifier::default();

        let report = start_with_source(&AppConfig::new(db_path), Some(catalog.clone()), &notifier).await;

        assert!(matches!(report.store_status, StoreStatus::Unavailable(_)));
        assert!(report.services.is_none());
        assert!(catalog.calls().is_empty());
        let messages = notifier.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].1, Severity::Error);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn install_id_is_stable_across_starts() {
        let tmp = tempdir().unwrap();
        let config = AppConfig::new(tmp.path().join("deckvault.db"));
        let notifier = RecordingNotifier::default();

        let first = start_with_source(&config, None, &notifier).await.services.unwrap();
        let first_id = first.install_id.clone();
        drop(first);
        let second = start_with_source(&config, None, &notifier).await.services.unwrap();

        assert_eq!(second.install_id, first_id);
        assert!(second.engine.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_catalog_config_starts_offline_with_warning() {
        let tmp = tempdir().unwrap();
        let mut config = AppConfig::new(tmp.path().join("deckvault.db"));
        config.catalog = Some(CatalogConfig::new("not a url", "anon-key"));
        let notifier = RecordingNotifier::default();

        let report = start(&config, &notifier).await;

        assert_eq!(report.store_status, StoreStatus::Ready);
        assert_eq!(report.initial_sync, InitialSync::NotAttempted);
        assert_eq!(notifier.messages()[0].1, Severity::Warning);
    }
}
