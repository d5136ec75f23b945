//! HTTP client for the hosted catalog table (PostgREST-style REST API).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

use super::CatalogSource;
use crate::config::CatalogConfig;
use crate::models::Card;
use crate::util::{compact_text, to_rfc3339_micros};
use crate::{Error, Result};

/// Read-only client for the remote card catalog.
///
/// Results are paged in `updated_at, id` order, each page starting after the
/// last row of the one before, and collected in full before returning.
#[derive(Clone)]
pub struct RemoteCatalogClient {
    endpoint: String,
    api_key: String,
    page_size: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for RemoteCatalogClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemoteCatalogClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl RemoteCatalogClient {
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|error| Error::Config(format!("failed to build HTTP client: {error}")))?;

        Ok(Self {
            endpoint: format!(
                "{}/rest/v1/{}",
                config.base_url.trim().trim_end_matches('/'),
                config.table.trim()
            ),
            api_key: config.api_key.trim().to_string(),
            page_size: config.page_size,
            client,
        })
    }

    async fn fetch_pages(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Card>> {
        let mut cards: Vec<Card> = Vec::new();
        let mut cursor: Option<PageCursor> = None;

        loop {
            let filter = match (&cursor, since) {
                (Some(cursor), _) => Some(cursor.filter()),
                (None, Some(since)) => Some(format!(
                    "updated_at=gt.{}",
                    urlencoding::encode(&to_rfc3339_micros(&since))
                )),
                (None, None) => None,
            };
            let url = self.page_url(filter.as_deref());
            let page = self.fetch_page(&url).await?;
            let count = page.len();
            tracing::debug!(count, after = ?cursor, "Fetched catalog page");

            if let Some(last) = page.last() {
                cursor = Some(PageCursor {
                    updated_at: last.updated_at,
                    id: last.id.clone(),
                });
            }
            cards.extend(page);

            if count < self.page_size {
                break;
            }
        }

        Ok(cards)
    }

    async fn fetch_page(&self, url: &str) -> Result<Vec<Card>> {
        let response = self
            .client
            .get(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|error| Error::RemoteFetch(format!("catalog request failed: {}", sanitize(&error))))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteFetch(parse_api_error(status, &body)));
        }

        response
            .json::<Vec<Card>>()
            .await
            .map_err(|error| Error::RemoteFetch(format!("catalog payload invalid: {}", sanitize(&error))))
    }

    fn page_url(&self, filter: Option<&str>) -> String {
        let mut url = format!(
            "{}?select=*&order=updated_at.asc,id.asc&limit={}",
            self.endpoint, self.page_size
        );
        if let Some(filter) = filter {
            url.push('&');
            url.push_str(filter);
        }
        url
    }
}

/// Position after the last row of a page, in `(updated_at, id)` order.
///
/// Rows updated on the server while paging move past the cursor instead of
/// shifting unseen rows into pages already read.
#[derive(Debug)]
struct PageCursor {
    updated_at: DateTime<Utc>,
    id: String,
}

impl PageCursor {
    /// PostgREST filter selecting rows strictly after the cursor.
    fn filter(&self) -> String {
        let updated_at = quote(&to_rfc3339_micros(&self.updated_at));
        let id = quote(&self.id);
        let tree = format!(
            "(updated_at.gt.{updated_at},and(updated_at.eq.{updated_at},id.gt.{id}))"
        );
        format!("or={}", urlencoding::encode(&tree))
    }
}

/// Double-quote a logic-tree value so `.`, `:` and `,` are taken literally.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

#[async_trait]
impl CatalogSource for RemoteCatalogClient {
    async fn fetch_all(&self) -> Result<Vec<Card>> {
        self.fetch_pages(None).await
    }

    async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<Card>> {
        self.fetch_pages(Some(since)).await
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    error: Option<String>,
    hint: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return match payload.hint {
                Some(hint) => format!("{} ({}; {})", message.trim(), status.as_u16(), hint.trim()),
                None => format!("{} ({})", message.trim(), status.as_u16()),
            };
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn sanitize(error: &impl std::fmt::Display) -> String {
    error.to_string().replace('\n', " ").trim().to_string()
}
