//! Remote catalog access.
//!
//! [`CatalogSource`] is the read-only seam the sync engine depends on;
//! [`RemoteCatalogClient`] implements it over the hosted catalog table.

mod client;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::Card;
use crate::Result;

pub use client::RemoteCatalogClient;

/// Read access to the authoritative card catalog
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Every card in the catalog
    async fn fetch_all(&self) -> Result<Vec<Card>>;

    /// Cards whose `updated_at` is strictly greater than `since`
    async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<Card>>;
}
