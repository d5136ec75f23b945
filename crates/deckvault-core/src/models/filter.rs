//! Typed query predicate for the local card catalog

use libsql::Value;

/// Filter over locally stored cards.
///
/// Every populated field narrows the result; an empty filter matches all
/// cards. Compiled to parameterised SQL by [`CardFilter::to_sql`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardFilter {
    /// Case-insensitive substring of the card name
    pub name_contains: Option<String>,
    /// Exact set abbreviation
    pub set_abbreviation: Option<String>,
    pub rarity: Option<String>,
    pub domain: Option<String>,
    pub card_type: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub limit: Option<usize>,
}

impl CardFilter {
    /// Match cards whose name contains `fragment`.
    #[must_use]
    pub fn name_contains(mut self, fragment: impl Into<String>) -> Self {
        self.name_contains = Some(fragment.into());
        self
    }

    /// Match cards from one set.
    #[must_use]
    pub fn in_set(mut self, abbreviation: impl Into<String>) -> Self {
        self.set_abbreviation = Some(abbreviation.into());
        self
    }

    #[must_use]
    pub fn rarity(mut self, rarity: impl Into<String>) -> Self {
        self.rarity = Some(rarity.into());
        self
    }

    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn card_type(mut self, card_type: impl Into<String>) -> Self {
        self.card_type = Some(card_type.into());
        self
    }

    /// Match cards priced within `[min, max]`.
    #[must_use]
    pub const fn price_between(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_price = min;
        self.max_price = max;
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Build the `WHERE` / `LIMIT` tail and its positional parameters.
    pub(crate) fn to_sql(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut params = Vec::new();

        if let Some(fragment) = &self.name_contains {
            clauses.push("name LIKE ? ESCAPE '\\'");
            params.push(Value::Text(format!("%{}%", escape_like(fragment))));
        }
        if let Some(abbreviation) = &self.set_abbreviation {
            clauses.push("set_abbreviation = ? COLLATE NOCASE");
            params.push(Value::Text(abbreviation.clone()));
        }
        if let Some(rarity) = &self.rarity {
            clauses.push("rarity = ? COLLATE NOCASE");
            params.push(Value::Text(rarity.clone()));
        }
        if let Some(domain) = &self.domain {
            clauses.push("domain = ? COLLATE NOCASE");
            params.push(Value::Text(domain.clone()));
        }
        if let Some(card_type) = &self.card_type {
            clauses.push("card_type = ? COLLATE NOCASE");
            params.push(Value::Text(card_type.clone()));
        }
        if let Some(min) = self.min_price {
            clauses.push("price >= ?");
            params.push(Value::Real(min));
        }
        if let Some(max) = self.max_price {
            clauses.push("price <= ?");
            params.push(Value::Real(max));
        }

        let mut sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        sql.push_str(" ORDER BY set_abbreviation ASC, name ASC, id ASC");
        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            params.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        }

        (sql, params)
    }
}

fn escape_like(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len());
    for ch in fragment.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
