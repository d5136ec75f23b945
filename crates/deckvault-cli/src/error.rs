use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] deckvault_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Card ID cannot be empty")]
    EmptyCardId,
    #[error("Card not found: {0}")]
    CardNotFound(String),
    #[error("Price range is inverted: min {min} is above max {max}")]
    InvalidPriceRange { min: f64, max: f64 },
    #[error("Local card storage is unavailable: {0}")]
    StoreUnavailable(String),
    #[error(
        "Remote catalog is not configured. Set DECKVAULT_CATALOG_URL and DECKVAULT_CATALOG_KEY, add a \"catalog\" section to the config file, or pass --catalog-url and --catalog-key."
    )]
    CatalogNotConfigured,
}
