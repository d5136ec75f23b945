//! Sync run log model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which remote read a sync run performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Whole catalog (`fetch_all`)
    Full,
    /// Delta since the local watermark (`fetch_since`)
    Incremental,
}

impl SyncMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "full" => Some(Self::Full),
            "incremental" => Some(Self::Incremental),
            _ => None,
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final state of a recorded sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncRunStatus {
    Succeeded,
    Failed,
}

impl SyncRunStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One recorded sync attempt, tagged with the install that ran it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRun {
    /// Run identifier (UUID v7)
    pub id: String,
    /// Per-install identifier of the device that ran the sync
    pub install_id: String,
    pub mode: SyncMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Rows returned by the remote catalog
    pub fetched: u64,
    /// Rows written to the local store
    pub applied: u64,
    /// Rows skipped because the stored copy was newer
    pub stale: u64,
    pub status: SyncRunStatus,
    /// Failure cause, when `status` is `Failed`
    pub error: Option<String>,
}
