//! Database connection management

use crate::error::{Error, Result};
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::path::Path;

use super::migrations;

/// Database wrapper for a local libSQL file
pub struct Database {
    _db: LibSqlDatabase,
    conn: Connection,
}

impl Database {
    /// Open the local database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically. Engine failures surface as
    /// [`Error::StorageInit`]; a failed migration surfaces as
    /// [`Error::Migration`] with the previous schema left in place.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        Self::open_with(&path_str).await
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        Self::open_with(":memory:").await
    }

    async fn open_with(target: &str) -> Result<Self> {
        let db = Builder::new_local(target)
            .build()
            .await
            .map_err(|error| storage_init(target, &error))?;
        let conn = db.connect().map_err(|error| storage_init(target, &error))?;

        let database = Self { _db: db, conn };
        database
            .configure()
            .await
            .map_err(|error| storage_init(target, &error))?;
        database.migrate().await?;
        Ok(database)
    }

    /// Configure `SQLite` for an on-device cache
    async fn configure(&self) -> Result<()> {
        // journal_mode returns a row and is a no-op for in-memory databases
        self.conn
            .execute("PRAGMA journal_mode = WAL;", ())
            .await
            .ok();
        self.conn
            .execute("PRAGMA synchronous = NORMAL;", ())
            .await
            .ok();
        self.conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
        self.conn
            .execute("PRAGMA cache_size = 10000;", ())
            .await
            .ok();
        Ok(())
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        match migrations::run(&self.conn).await {
            Err(Error::LibSql(error)) => Err(Error::StorageInit(error.to_string())),
            other => other,
        }
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn storage_init(target: &str, error: &impl std::fmt::Display) -> Error {
    Error::StorageInit(format!("{target}: {error}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_in_memory() {
        let db = Database::open_in_memory().await.unwrap();
        let mut rows = db
            .connection()
            .query("SELECT COUNT(*) FROM cards", ())
            .await
            .unwrap();
        let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reopen_file_is_idempotent() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("deckvault.db");

        drop(Database::open(&db_path).await.unwrap());
        let reopened = Database::open(&db_path).await.unwrap();
        let version = migrations::current_version(reopened.connection())
            .await
            .unwrap();
        assert_eq!(version, migrations::CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_garbage_file_is_storage_init_error() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("deckvault.db");
        std::fs::write(&db_path, vec![0x42_u8; 8192]).unwrap();

        let error = Database::open(&db_path).await.err().unwrap();
        assert!(error.is_storage_fatal(), "unexpected error: {error}");
    }
}
