//! Database layer for Deckvault

mod card_repository;
mod connection;
pub(crate) mod migrations;
mod settings_repository;
mod sync_run_repository;

pub use card_repository::{ApplyOutcome, CardRepository, LibSqlCardRepository};
pub use connection::Database;
pub use settings_repository::{LibSqlSettingsRepository, SettingsRepository};
pub use sync_run_repository::{LibSqlSyncRunRepository, SyncRunRepository};
