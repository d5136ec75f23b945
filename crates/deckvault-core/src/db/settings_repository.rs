//! Key/value settings repository implementation

use crate::error::Result;
use libsql::Connection;

/// Trait for local key/value settings (async)
#[allow(async_fn_in_trait)]
pub trait SettingsRepository {
    /// Read a value, `None` when the key was never written
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value only if the key is absent; returns the stored value
    async fn get_or_insert(&self, key: &str, value: &str) -> Result<String>;
}

/// libSQL implementation of `SettingsRepository`
pub struct LibSqlSettingsRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSettingsRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SettingsRepository for LibSqlSettingsRepository<'_> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM settings WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            let value: String = row.get(0)?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    async fn get_or_insert(&self, key: &str, value: &str) -> Result<String> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)",
                [key, value],
            )
            .await?;
        Ok(self.get(key).await?.unwrap_or_else(|| value.to_string()))
    }
}
