//! In-memory catalog used by sync tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;

use crate::catalog::CatalogSource;
use crate::models::Card;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    All,
    Since(DateTime<Utc>),
}

#[derive(Default)]
pub struct FakeCatalog {
    cards: Mutex<Vec<Card>>,
    calls: Mutex<Vec<Call>>,
    failing: AtomicBool,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeCatalog {
    pub fn with_cards(cards: Vec<Card>) -> Arc<Self> {
        let fake = Self::default();
        *fake.cards.lock().unwrap() = cards;
        Arc::new(fake)
    }

    pub fn set_cards(&self, cards: Vec<Card>) {
        *self.cards.lock().unwrap() = cards;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make the next fetches wait until the returned handle is notified.
    pub fn hold(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&notify));
        notify
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    async fn respond(&self, call: Call) -> Result<Vec<Card>> {
        self.calls.lock().unwrap().push(call.clone());

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::RemoteFetch("catalog unreachable".to_string()));
        }

        let cards = self.cards.lock().unwrap().clone();
        Ok(match call {
            Call::All => cards,
            Call::Since(since) => cards
                .into_iter()
                .filter(|card| card.updated_at > since)
                .collect(),
        })
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn fetch_all(&self) -> Result<Vec<Card>> {
        self.respond(Call::All).await
    }

    async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<Card>> {
        self.respond(Call::Since(since)).await
    }
}

/// A fixed instant offset by whole seconds.
pub fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_740_000_000 + seconds, 0).unwrap()
}

/// Decode a card the way the remote client does, so null prices are exercised.
pub fn remote_card(id: &str, price: Option<f64>, updated_at: DateTime<Utc>) -> Card {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "set_name": "Origins",
        "set_abbreviation": "OGN",
        "name": format!("Card {id}"),
        "price": price,
        "updated_at": updated_at.to_rfc3339(),
    }))
    .unwrap()
}
