//! Card catalog record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A single catalog card, as mirrored from the remote catalog.
///
/// `id` is the stable identity; `updated_at` is both the conflict-resolution
/// key and the incremental-fetch watermark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Globally unique catalog key
    pub id: String,
    /// Display name of the set
    #[serde(default)]
    pub set_name: String,
    /// Short set code (e.g. "OGN")
    #[serde(default, alias = "set_abbr")]
    pub set_abbreviation: String,
    /// Card display name
    pub name: String,
    /// Image reference
    #[serde(default)]
    pub image_url: Option<String>,
    /// Card type (unit, spell, gear, ...)
    #[serde(default, rename = "type", alias = "card_type")]
    pub card_type: Option<String>,
    #[serde(default)]
    pub rarity: Option<String>,
    /// Domain / colour identity
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub energy: Option<i64>,
    #[serde(default)]
    pub might: Option<i64>,
    #[serde(default)]
    pub power: Option<i64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub ability: Option<String>,
    /// Market price; absent or null prices are ingested as 0
    #[serde(default, deserialize_with = "null_as_zero")]
    pub price: f64,
    /// Most recent price movement
    #[serde(default)]
    pub price_change: Option<f64>,
    /// Last modification time on the remote catalog
    pub updated_at: DateTime<Utc>,
}

impl Card {
    /// Create a card with only identity, name and freshness set.
    pub fn new(id: impl Into<String>, name: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            set_name: String::new(),
            set_abbreviation: String::new(),
            name: name.into(),
            image_url: None,
            card_type: None,
            rarity: None,
            domain: None,
            energy: None,
            might: None,
            power: None,
            tags: Vec::new(),
            ability: None,
            price: 0.0,
            price_change: None,
            updated_at,
        }
    }

    /// Set the owning set.
    #[must_use]
    pub fn in_set(mut self, set_name: impl Into<String>, abbreviation: impl Into<String>) -> Self {
        self.set_name = set_name.into();
        self.set_abbreviation = abbreviation.into();
        self
    }

    /// Set the market price.
    #[must_use]
    pub const fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn null_price_and_tags_are_coerced() {
        let card: Card = serde_json::from_value(serde_json::json!({
            "id": "OGN-001",
            "name": "Blazing Scorcher",
            "price": null,
            "tags": null,
            "updated_at": "2025-03-01T10:15:30.123456+00:00"
        }))
        .unwrap();

        assert!(card.price.abs() < f64::EPSILON);
        assert!(card.tags.is_empty());
        assert_eq!(card.updated_at.timestamp_subsec_micros(), 123_456);
    }

    #[test]
    fn missing_price_defaults_to_zero() {
        let card: Card = serde_json::from_value(serde_json::json!({
            "id": "OGN-002",
            "name": "Brazen Buccaneer",
            "updated_at": "2025-03-01T10:15:30Z"
        }))
        .unwrap();

        assert!(card.price.abs() < f64::EPSILON);
    }

    #[test]
    fn remote_field_names_are_mapped() {
        let card: Card = serde_json::from_value(serde_json::json!({
            "id": "OGN-010",
            "set_name": "Origins",
            "set_abbreviation": "OGN",
            "name": "Jinx, Rebel",
            "image_url": "https://cdn.example.com/ogn-010.png",
            "type": "Champion",
            "rarity": "Epic",
            "domain": "Chaos",
            "energy": 5,
            "might": 4,
            "power": 1,
            "tags": ["Jinx", "Zaun"],
            "ability": "Deflect",
            "price": 12.5,
            "price_change": -0.75,
            "updated_at": "2025-03-01T10:15:30Z"
        }))
        .unwrap();

        assert_eq!(card.card_type.as_deref(), Some("Champion"));
        assert_eq!(card.set_abbreviation, "OGN");
        assert_eq!(card.tags, vec!["Jinx".to_string(), "Zaun".to_string()]);
        assert_eq!(card.energy, Some(5));
        assert_eq!(card.price_change, Some(-0.75));
    }
}
