//! Sync run log repository implementation

use crate::error::Result;
use crate::models::{SyncMode, SyncRun, SyncRunStatus};
use crate::util::from_micros;
use libsql::{Connection, Row, Value};

const RUN_COLUMNS: &str =
    "id, install_id, mode, started_at, finished_at, fetched, applied, stale, status, error";

/// Runs kept in the log; older ones are pruned as new runs are recorded.
const RETAINED_RUNS: usize = 500;

/// Trait for sync run log operations (async)
#[allow(async_fn_in_trait)]
pub trait SyncRunRepository {
    /// Append a finished run, dropping all but the newest `RETAINED_RUNS`
    async fn record(&self, run: &SyncRun) -> Result<()>;

    /// Most recently finished run
    async fn latest(&self) -> Result<Option<SyncRun>>;

    /// Recent runs, newest first
    async fn list(&self, limit: usize) -> Result<Vec<SyncRun>>;
}

/// libSQL implementation of `SyncRunRepository`
pub struct LibSqlSyncRunRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSyncRunRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    async fn insert_and_prune(&self, run: &SyncRun) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO sync_runs (
                    id, install_id, mode, started_at, finished_at, fetched, applied, stale, status, error
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                vec![
                    Value::Text(run.id.clone()),
                    Value::Text(run.install_id.clone()),
                    Value::Text(run.mode.as_str().to_string()),
                    Value::Integer(run.started_at.timestamp_micros()),
                    Value::Integer(run.finished_at.timestamp_micros()),
                    Value::Integer(i64::try_from(run.fetched).unwrap_or(i64::MAX)),
                    Value::Integer(i64::try_from(run.applied).unwrap_or(i64::MAX)),
                    Value::Integer(i64::try_from(run.stale).unwrap_or(i64::MAX)),
                    Value::Text(run.status.as_str().to_string()),
                    run.error.clone().map_or(Value::Null, Value::Text),
                ],
            )
            .await?;

        self.conn
            .execute(
                "DELETE FROM sync_runs WHERE id NOT IN (
                    SELECT id FROM sync_runs ORDER BY finished_at DESC, id DESC LIMIT ?
                )",
                vec![Value::Integer(i64::try_from(RETAINED_RUNS).unwrap_or(i64::MAX))],
            )
            .await?;
        Ok(())
    }

    fn parse_run(row: &Row) -> Result<SyncRun> {
        let mode: String = row.get(2)?;
        let status: String = row.get(8)?;
        Ok(SyncRun {
            id: row.get(0)?,
            install_id: row.get(1)?,
            mode: SyncMode::parse(&mode).unwrap_or(SyncMode::Incremental),
            started_at: from_micros(row.get(3)?),
            finished_at: from_micros(row.get(4)?),
            fetched: count(row.get(5)?),
            applied: count(row.get(6)?),
            stale: count(row.get(7)?),
            status: SyncRunStatus::parse(&status).unwrap_or(SyncRunStatus::Failed),
            error: match row.get_value(9)? {
                Value::Text(text) => Some(text),
                _ => None,
            },
        })
    }
}

impl SyncRunRepository for LibSqlSyncRunRepository<'_> {
    async fn record(&self, run: &SyncRun) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        if let Err(e) = self.insert_and_prune(run).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e);
        }

        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
        Ok(())
    }

    async fn latest(&self) -> Result<Option<SyncRun>> {
        Ok(self.list(1).await?.pop())
    }

    async fn list(&self, limit: usize) -> Result<Vec<SyncRun>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {RUN_COLUMNS} FROM sync_runs ORDER BY finished_at DESC, id DESC LIMIT ?"
                ),
                vec![Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX))],
            )
            .await?;

        let mut runs = Vec::new();
        while let Some(row) = rows.next().await? {
            runs.push(Self::parse_run(&row)?);
        }
        Ok(runs)
    }
}

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;

    fn run(id: &str, finished_offset_secs: i64, status: SyncRunStatus) -> SyncRun {
        let started_at = from_micros(Utc::now().timestamp_micros());
        SyncRun {
            id: id.to_string(),
            install_id: "1700000000000-abc123def".to_string(),
            mode: SyncMode::Incremental,
            started_at,
            finished_at: started_at + Duration::seconds(finished_offset_secs),
            fetched: 3,
            applied: 2,
            stale: 1,
            status,
            error: (status == SyncRunStatus::Failed).then(|| "timeout".to_string()),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_record_and_latest() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlSyncRunRepository::new(db.connection());

        assert_eq!(repo.latest().await.unwrap(), None);

        let first = run("run-1", 1, SyncRunStatus::Succeeded);
        let second = run("run-2", 5, SyncRunStatus::Failed);
        repo.record(&first).await.unwrap();
        repo.record(&second).await.unwrap();

        assert_eq!(repo.latest().await.unwrap(), Some(second.clone()));
        assert_eq!(repo.list(10).await.unwrap(), vec![second, first]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_record_prunes_oldest_runs() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlSyncRunRepository::new(db.connection());

        let total = RETAINED_RUNS + 3;
        for index in 0..total {
            let offset = i64::try_from(index).unwrap();
            repo.record(&run(&format!("run-{index:04}"), offset, SyncRunStatus::Succeeded))
                .await
                .unwrap();
        }

        let runs = repo.list(total).await.unwrap();
        assert_eq!(runs.len(), RETAINED_RUNS);
        assert_eq!(runs[0].id, format!("run-{:04}", total - 1));
        assert_eq!(runs[RETAINED_RUNS - 1].id, "run-0003");
    }
}
