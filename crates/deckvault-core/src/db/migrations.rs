//! Database migrations
//!
//! Each migration is a named, ordered step applied inside one transaction.
//! The `schema_version` table is the persisted version counter: a migration
//! runs only when its version is above the recorded maximum, and its version
//! row is written in the same transaction as its statements.

use crate::error::{Error, Result};
use libsql::{Connection, Value};

/// Current schema version
pub const CURRENT_VERSION: i32 = 3;

/// A single versioned schema step
pub(crate) struct Migration {
    pub version: i32,
    pub name: &'static str,
    pub statements: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_cards",
        statements: &[
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at INTEGER NOT NULL
            )",
            // Key/value table (local only)
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            // Catalog mirror as first shipped: price was nullable
            "CREATE TABLE IF NOT EXISTS cards (
                id TEXT PRIMARY KEY,
                set_name TEXT NOT NULL DEFAULT '',
                set_abbreviation TEXT NOT NULL DEFAULT '',
                name TEXT NOT NULL,
                image_url TEXT,
                card_type TEXT,
                rarity TEXT,
                domain TEXT,
                energy INTEGER,
                might INTEGER,
                power INTEGER,
                tags TEXT NOT NULL DEFAULT '[]',
                ability TEXT,
                price REAL,
                price_change REAL,
                updated_at INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_cards_name ON cards(name)",
            "CREATE INDEX IF NOT EXISTS idx_cards_set_abbreviation ON cards(set_abbreviation)",
        ],
    },
    Migration {
        version: 2,
        name: "cards_price_not_null",
        // SQLite cannot alter a column constraint in place: rebuild through a
        // shadow table. A leftover shadow table is discarded and rebuilt.
        statements: &[
            "DROP TABLE IF EXISTS cards_new",
            "CREATE TABLE cards_new (
                id TEXT PRIMARY KEY,
                set_name TEXT NOT NULL DEFAULT '',
                set_abbreviation TEXT NOT NULL DEFAULT '',
                name TEXT NOT NULL,
                image_url TEXT,
                card_type TEXT,
                rarity TEXT,
                domain TEXT,
                energy INTEGER,
                might INTEGER,
                power INTEGER,
                tags TEXT NOT NULL DEFAULT '[]',
                ability TEXT,
                price REAL NOT NULL DEFAULT 0,
                price_change REAL,
                updated_at INTEGER NOT NULL
            )",
            "INSERT INTO cards_new (
                id, set_name, set_abbreviation, name, image_url, card_type, rarity, domain,
                energy, might, power, tags, ability, price, price_change, updated_at
            )
            SELECT
                id, set_name, set_abbreviation, name, image_url, card_type, rarity, domain,
                energy, might, power, tags, ability, COALESCE(price, 0), price_change, updated_at
            FROM cards",
            "DROP TABLE cards",
            "ALTER TABLE cards_new RENAME TO cards",
            "CREATE INDEX IF NOT EXISTS idx_cards_name ON cards(name)",
            "CREATE INDEX IF NOT EXISTS idx_cards_set_abbreviation ON cards(set_abbreviation)",
        ],
    },
    Migration {
        version: 3,
        name: "create_sync_runs",
        statements: &[
            "CREATE TABLE IF NOT EXISTS sync_runs (
                id TEXT PRIMARY KEY,
                install_id TEXT NOT NULL,
                mode TEXT NOT NULL,
                started_at INTEGER NOT NULL,
                finished_at INTEGER NOT NULL,
                fetched INTEGER NOT NULL DEFAULT 0,
                applied INTEGER NOT NULL DEFAULT 0,
                stale INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                error TEXT
            )",
            "CREATE INDEX IF NOT EXISTS idx_sync_runs_finished ON sync_runs(finished_at DESC)",
        ],
    },
];

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    run_to(conn, CURRENT_VERSION).await
}

/// Run pending migrations up to and including `target`
pub(crate) async fn run_to(conn: &Connection, target: i32) -> Result<()> {
    let mut version = current_version(conn).await?;

    for migration in MIGRATIONS.iter().filter(|m| m.version <= target) {
        if migration.version <= version {
            continue;
        }
        apply(conn, migration).await?;
        version = migration.version;
    }

    Ok(())
}

/// Get the current schema version
pub(crate) async fn current_version(conn: &Connection) -> Result<i32> {
    let read_error = |error: libsql::Error| Error::Migration {
        version: 0,
        name: "read_schema_version",
        message: error.to_string(),
    };

    // Check if schema_version table exists
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await
        .map_err(read_error)?;

    let exists: bool = if let Some(row) = rows.next().await.map_err(read_error)? {
        row.get::<i32>(0).map_err(read_error)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await
        .map_err(read_error)?;

    let version: i32 = if let Some(row) = rows.next().await.map_err(read_error)? {
        row.get(0).map_err(read_error)?
    } else {
        0
    };

    Ok(version)
}

/// Apply one migration atomically; on any failure the transaction is rolled back
pub(crate) async fn apply(conn: &Connection, migration: &Migration) -> Result<()> {
    let fail = |error: libsql::Error| Error::Migration {
        version: migration.version,
        name: migration.name,
        message: error.to_string(),
    };

    conn.execute("BEGIN TRANSACTION", ()).await.map_err(fail)?;

    for stmt in migration.statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(fail(e));
        }
    }

    let record = conn
        .execute(
            "INSERT INTO schema_version (version, name, applied_at) VALUES (?, ?, ?)",
            vec![
                Value::Integer(i64::from(migration.version)),
                Value::Text(migration.name.to_string()),
                Value::Integer(chrono::Utc::now().timestamp_millis()),
            ],
        )
        .await;
    if let Err(e) = record {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(fail(e));
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(fail(e));
    }

    tracing::info!(
        version = migration.version,
        name = migration.name,
        "Migrated database"
    );
    Ok(())
}
