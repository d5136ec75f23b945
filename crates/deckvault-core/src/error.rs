//! Error types for deckvault-core

use thiserror::Error;

/// Result type alias using deckvault-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in deckvault-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// The local storage engine could not be opened
    #[error("Storage initialization failed: {0}")]
    StorageInit(String),

    /// A schema migration failed and was rolled back
    #[error("Migration {version} ({name}) failed: {message}")]
    Migration {
        version: i32,
        name: &'static str,
        message: String,
    },

    /// Fetching from the remote catalog failed
    #[error("Remote fetch failed: {0}")]
    RemoteFetch(String),

    /// A batch upsert failed and was rolled back
    #[error("Upsert failed: {0}")]
    Upsert(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the error means the local store cannot be used at all.
    pub const fn is_storage_fatal(&self) -> bool {
        matches!(self, Self::StorageInit(_) | Self::Migration { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_error_names_version_and_step() {
        let error = Error::Migration {
            version: 2,
            name: "cards_price_not_null",
            message: "no such table: cards".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Migration 2 (cards_price_not_null) failed: no such table: cards"
        );
        assert!(error.is_storage_fatal());
    }

    #[test]
    fn remote_fetch_is_not_storage_fatal() {
        assert!(!Error::RemoteFetch("timeout".to_string()).is_storage_fatal());
        assert!(!Error::Upsert("disk full".to_string()).is_storage_fatal());
    }
}
