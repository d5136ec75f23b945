//! Card repository implementation

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use libsql::{Connection, Row, Value};

use crate::error::{Error, Result};
use crate::models::{Card, CardFilter};
use crate::util::from_micros;

const CARD_COLUMNS: &str = "id, set_name, set_abbreviation, name, image_url, card_type, rarity, \
     domain, energy, might, power, tags, ability, price, price_change, updated_at";

const REPLACE_SQL: &str = "INSERT OR REPLACE INTO cards (
        id, set_name, set_abbreviation, name, image_url, card_type, rarity, domain,
        energy, might, power, tags, ability, price, price_change, updated_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

// Replaces only when the incoming row is not older than the stored one.
const APPLY_NEWER_SQL: &str = "INSERT INTO cards (
        id, set_name, set_abbreviation, name, image_url, card_type, rarity, domain,
        energy, might, power, tags, ability, price, price_change, updated_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        set_name = excluded.set_name,
        set_abbreviation = excluded.set_abbreviation,
        name = excluded.name,
        image_url = excluded.image_url,
        card_type = excluded.card_type,
        rarity = excluded.rarity,
        domain = excluded.domain,
        energy = excluded.energy,
        might = excluded.might,
        power = excluded.power,
        tags = excluded.tags,
        ability = excluded.ability,
        price = excluded.price,
        price_change = excluded.price_change,
        updated_at = excluded.updated_at
    WHERE excluded.updated_at >= cards.updated_at";

/// Result of applying a remote batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Rows inserted or replaced
    pub applied: u64,
    /// Rows skipped because the stored copy was newer
    pub stale: u64,
}

/// Trait for card storage operations (async)
#[allow(async_fn_in_trait)]
pub trait CardRepository {
    /// Insert or replace cards by id in one transaction (last write wins)
    async fn upsert_many(&self, cards: &[Card]) -> Result<u64>;

    /// Insert or replace cards by id in one transaction, never replacing a
    /// stored row with an older `updated_at`
    async fn apply_newer(&self, cards: &[Card]) -> Result<ApplyOutcome>;

    /// Get a card by id
    async fn get(&self, id: &str) -> Result<Option<Card>>;

    /// List cards matching the filter, ordered by set then name
    async fn list(&self, filter: &CardFilter) -> Result<Vec<Card>>;

    /// Number of stored cards
    async fn count(&self) -> Result<u64>;

    /// Most recent `updated_at` among stored cards
    async fn watermark(&self) -> Result<Option<DateTime<Utc>>>;
}

/// libSQL implementation of `CardRepository`
pub struct LibSqlCardRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlCardRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Run `sql` once per card inside a single transaction.
    ///
    /// Returns the number of rows each statement changed. Any failure rolls
    /// back the whole batch.
    async fn write_batch(&self, cards: &[&Card], sql: &str) -> Result<u64> {
        if cards.is_empty() {
            return Ok(0);
        }

        self.conn
            .execute("BEGIN TRANSACTION", ())
            .await
            .map_err(|e| Error::Upsert(e.to_string()))?;

        let mut changed = 0;
        for card in cards {
            match self.write_one(card, sql).await {
                Ok(rows) => changed += rows,
                Err(e) => {
                    self.conn.execute("ROLLBACK", ()).await.ok();
                    return Err(e);
                }
            }
        }

        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(Error::Upsert(e.to_string()));
        }

        Ok(changed)
    }

    async fn write_one(&self, card: &Card, sql: &str) -> Result<u64> {
        if card.id.trim().is_empty() {
            return Err(Error::Upsert(format!(
                "card '{}' has an empty id",
                card.name
            )));
        }
        self.conn
            .execute(sql, card_params(card)?)
            .await
            .map_err(|e| Error::Upsert(format!("card {}: {e}", card.id)))
    }

    /// Parse a card from a database row
    fn parse_card(row: &Row) -> Result<Card> {
        let tags: String = row.get(11)?;
        Ok(Card {
            id: row.get(0)?,
            set_name: row.get(1)?,
            set_abbreviation: row.get(2)?,
            name: row.get(3)?,
            image_url: opt_text(row.get_value(4)?),
            card_type: opt_text(row.get_value(5)?),
            rarity: opt_text(row.get_value(6)?),
            domain: opt_text(row.get_value(7)?),
            energy: opt_integer(row.get_value(8)?),
            might: opt_integer(row.get_value(9)?),
            power: opt_integer(row.get_value(10)?),
            tags: serde_json::from_str(&tags)?,
            ability: opt_text(row.get_value(12)?),
            price: opt_real(row.get_value(13)?).unwrap_or(0.0),
            price_change: opt_real(row.get_value(14)?),
            updated_at: from_micros(row.get(15)?),
        })
    }

    async fn collect(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Card>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut cards = Vec::new();
        while let Some(row) = rows.next().await? {
            cards.push(Self::parse_card(&row)?);
        }
        Ok(cards)
    }
}

impl CardRepository for LibSqlCardRepository<'_> {
    async fn upsert_many(&self, cards: &[Card]) -> Result<u64> {
        let batch = collapse_by_id(cards, |_, _| true);
        self.write_batch(&batch, REPLACE_SQL).await
    }

    async fn apply_newer(&self, cards: &[Card]) -> Result<ApplyOutcome> {
        let batch = collapse_by_id(cards, |kept, next| next.updated_at >= kept.updated_at);
        let applied = self.write_batch(&batch, APPLY_NEWER_SQL).await?;
        let total = u64::try_from(batch.len()).unwrap_or(u64::MAX);
        Ok(ApplyOutcome {
            applied,
            stale: total.saturating_sub(applied),
        })
    }

    async fn get(&self, id: &str) -> Result<Option<Card>> {
        let sql = format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = ?");
        let mut cards = self
            .collect(&sql, vec![Value::Text(id.to_string())])
            .await?;
        Ok(cards.pop())
    }

    async fn list(&self, filter: &CardFilter) -> Result<Vec<Card>> {
        let (tail, params) = filter.to_sql();
        let sql = format!("SELECT {CARD_COLUMNS} FROM cards{tail}");
        self.collect(&sql, params).await
    }

    async fn count(&self) -> Result<u64> {
        let mut rows = self.conn.query("SELECT COUNT(*) FROM cards", ()).await?;
        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn watermark(&self) -> Result<Option<DateTime<Utc>>> {
        let mut rows = self
            .conn
            .query("SELECT MAX(updated_at) FROM cards", ())
            .await?;
        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        Ok(opt_integer(row.get_value(0)?).map(from_micros))
    }
}

/// One row per id, in first-seen order. A repeated id replaces the kept row
/// when `replaces(kept, next)` holds.
fn collapse_by_id<'c>(cards: &'c [Card], replaces: impl Fn(&Card, &Card) -> bool) -> Vec<&'c Card> {
    let mut slots: HashMap<&str, usize> = HashMap::with_capacity(cards.len());
    let mut kept: Vec<&Card> = Vec::with_capacity(cards.len());
    for card in cards {
        if let Some(&slot) = slots.get(card.id.as_str()) {
            if replaces(kept[slot], card) {
                kept[slot] = card;
            }
        } else {
            slots.insert(card.id.as_str(), kept.len());
            kept.push(card);
        }
    }
    kept
}

fn card_params(card: &Card) -> Result<Vec<Value>> {
    Ok(vec![
        Value::Text(card.id.clone()),
        Value::Text(card.set_name.clone()),
        Value::Text(card.set_abbreviation.clone()),
        Value::Text(card.name.clone()),
        text_or_null(card.image_url.as_ref()),
        text_or_null(card.card_type.as_ref()),
        text_or_null(card.rarity.as_ref()),
        text_or_null(card.domain.as_ref()),
        card.energy.map_or(Value::Null, Value::Integer),
        card.might.map_or(Value::Null, Value::Integer),
        card.power.map_or(Value::Null, Value::Integer),
        Value::Text(serde_json::to_string(&card.tags)?),
        text_or_null(card.ability.as_ref()),
        Value::Real(card.price),
        card.price_change.map_or(Value::Null, Value::Real),
        Value::Integer(card.updated_at.timestamp_micros()),
    ])
}

fn text_or_null(value: Option<&String>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.clone()))
}

fn opt_text(value: Value) -> Option<String> {
    match value {
        Value::Text(text) => Some(text),
        _ => None,
    }
}

fn opt_integer(value: Value) -> Option<i64> {
    match value {
        Value::Integer(number) => Some(number),
        #[allow(clippy::cast_possible_truncation)]
        Value::Real(number) => Some(number as i64),
        _ => None,
    }
}

fn opt_real(value: Value) -> Option<f64> {
    match value {
        Value::Real(number) => Some(number),
        #[allow(clippy::cast_precision_loss)]
        Value::Integer(number) => Some(number as f64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_740_000_000 + seconds, 0).unwrap()
    }

    fn card(id: &str, name: &str, updated: i64) -> Card {
        Card::new(id, name, at(updated)).in_set("Origins", "OGN")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_and_get() {
        let db = setup().await;
        let repo = LibSqlCardRepository::new(db.connection());

        let mut jinx = card("OGN-010", "Jinx, Rebel", 0).with_price(12.5);
        jinx.tags = vec!["Jinx".to_string(), "Zaun".to_string()];
        jinx.energy = Some(5);
        jinx.price_change = Some(-0.75);
        jinx.ability = Some("Deflect".to_string());

        assert_eq!(repo.upsert_many(&[jinx.clone()]).await.unwrap(), 1);

        let fetched = repo.get("OGN-010").await.unwrap().unwrap();
        assert_eq!(fetched, jinx);
        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_same_id_keeps_last_write() {
        let db = setup().await;
        let repo = LibSqlCardRepository::new(db.connection());

        repo.upsert_many(&[card("A-1", "First", 5)]).await.unwrap();
        // Storage-level upsert is last-write-wins by application order, even
        // when the later write carries an older timestamp.
        let written = repo
            .upsert_many(&[card("A-1", "Second", 1), card("A-1", "Third", 2)])
            .await
            .unwrap();
        assert_eq!(written, 1);

        let all = repo.list(&CardFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Third");
        assert_eq!(all[0].updated_at, at(2));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_apply_newer_skips_older_rows() {
        let db = setup().await;
        let repo = LibSqlCardRepository::new(db.connection());

        repo.upsert_many(&[card("A-1", "Current", 10), card("A-2", "Old", 1)])
            .await
            .unwrap();

        let outcome = repo
            .apply_newer(&[
                card("A-1", "Outdated", 5),
                card("A-2", "Refreshed", 20),
                card("A-3", "New", 3),
            ])
            .await
            .unwrap();

        assert_eq!(outcome, ApplyOutcome { applied: 2, stale: 1 });
        assert_eq!(repo.get("A-1").await.unwrap().unwrap().name, "Current");
        assert_eq!(repo.get("A-2").await.unwrap().unwrap().name, "Refreshed");
        assert_eq!(repo.count().await.unwrap(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_apply_newer_counts_repeated_id_once() {
        let db = setup().await;
        let repo = LibSqlCardRepository::new(db.connection());

        let outcome = repo
            .apply_newer(&[
                card("X-1", "First seen", 1),
                card("X-2", "Other", 2),
                card("X-1", "Updated mid-fetch", 5),
                card("X-1", "Stale repeat", 3),
            ])
            .await
            .unwrap();

        assert_eq!(outcome, ApplyOutcome { applied: 2, stale: 0 });
        let stored = repo.get("X-1").await.unwrap().unwrap();
        assert_eq!(stored.name, "Updated mid-fetch");
        assert_eq!(stored.updated_at, at(5));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_batch_rolls_back() {
        let db = setup().await;
        let repo = LibSqlCardRepository::new(db.connection());

        let result = repo
            .upsert_many(&[card("A-1", "Good", 1), card("  ", "No id", 1)])
            .await;

        assert!(matches!(result, Err(Error::Upsert(_))));
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_watermark_is_max_updated_at() {
        let db = setup().await;
        let repo = LibSqlCardRepository::new(db.connection());

        assert_eq!(repo.watermark().await.unwrap(), None);

        let precise = Utc
            .timestamp_opt(1_740_000_100, 123_456_000)
            .unwrap();
        repo.upsert_many(&[
            card("A-1", "One", 1),
            Card::new("A-2", "Two", precise),
            card("A-3", "Three", 50),
        ])
        .await
        .unwrap();

        assert_eq!(repo.watermark().await.unwrap(), Some(precise));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_with_filter() {
        let db = setup().await;
        let repo = LibSqlCardRepository::new(db.connection());

        let mut spell = card("OGN-020", "Hextech Ray", 1).with_price(0.25);
        spell.card_type = Some("Spell".to_string());
        let mut unit = card("OGN-021", "Zaun Warrior", 1).with_price(3.0);
        unit.card_type = Some("Unit".to_string());
        let other_set = Card::new("SFD-001", "Hextech Anomaly", at(1)).in_set("Spiritforged", "SFD");

        repo.upsert_many(&[spell, unit, other_set]).await.unwrap();

        let hextech = repo
            .list(&CardFilter::default().name_contains("hextech"))
            .await
            .unwrap();
        assert_eq!(hextech.len(), 2);

        let origins_units = repo
            .list(&CardFilter::default().in_set("ogn").card_type("unit"))
            .await
            .unwrap();
        assert_eq!(origins_units.len(), 1);
        assert_eq!(origins_units[0].id, "OGN-021");

        let cheap = repo
            .list(&CardFilter::default().price_between(None, Some(1.0)))
            .await
            .unwrap();
        let cheap_ids: Vec<_> = cheap.iter().map(|card| card.id.as_str()).collect();
        assert_eq!(cheap_ids, vec!["OGN-020", "SFD-001"]);

        let limited = repo.list(&CardFilter::default().limit(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
    }
}
