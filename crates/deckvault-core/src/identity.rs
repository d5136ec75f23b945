//! Durable per-install identifier.
//!
//! Format is `<millisecond-timestamp>-<random>`, created on first access and
//! persisted in the local settings table. Uniqueness is best-effort and the
//! value is not a secret.

use chrono::Utc;
use rand::Rng;
use tokio::sync::OnceCell;

use crate::services::CardStore;
use crate::Result;

/// Settings key the identifier is stored under
pub const INSTALL_ID_KEY: &str = "install_id";

const RANDOM_SUFFIX_LEN: usize = 9;

/// Lazily created, persisted install identifier.
pub struct InstallIdentity {
    store: CardStore,
    cached: OnceCell<String>,
}

impl InstallIdentity {
    pub fn new(store: CardStore) -> Self {
        Self {
            store,
            cached: OnceCell::new(),
        }
    }

    /// Return the install id, creating and persisting it on first use.
    pub async fn install_id(&self) -> Result<String> {
        self.cached
            .get_or_try_init(|| self.load_or_create())
            .await
            .cloned()
    }

    async fn load_or_create(&self) -> Result<String> {
        if let Some(existing) = self.store.setting(INSTALL_ID_KEY).await? {
            return Ok(existing);
        }

        let candidate = generate_install_id(Utc::now().timestamp_millis(), &mut rand::thread_rng());
        let stored = self
            .store
            .setting_or_insert(INSTALL_ID_KEY, &candidate)
            .await?;
        if stored == candidate {
            tracing::info!(install_id = %stored, "Created install identifier");
        }
        Ok(stored)
    }
}

/// Build an identifier from a millisecond timestamp and lowercase base-36 noise.
pub fn generate_install_id(timestamp_millis: i64, rng: &mut impl Rng) -> String {
    let suffix: String = (0..RANDOM_SUFFIX_LEN)
        .filter_map(|_| char::from_digit(rng.gen_range(0..36), 36))
        .collect();
    format!("{timestamp_millis}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn generated_id_has_timestamp_and_base36_suffix() {
        let mut rng = StdRng::seed_from_u64(7);
        let id = generate_install_id(1_740_000_000_123, &mut rng);

        let (timestamp, suffix) = id.split_once('-').unwrap();
        assert_eq!(timestamp, "1740000000123");
        assert_eq!(suffix.len(), RANDOM_SUFFIX_LEN);
        assert!(suffix
            .chars()
            .all(|ch| ch.is_ascii_digit() || ch.is_ascii_lowercase()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn install_id_is_created_once_and_persisted() {
        let store = CardStore::open_in_memory().await.unwrap();

        let first = InstallIdentity::new(store.clone()).install_id().await.unwrap();
        let second = InstallIdentity::new(store.clone()).install_id().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            store.setting(INSTALL_ID_KEY).await.unwrap().as_deref(),
            Some(first.as_str())
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn existing_install_id_is_reused() {
        let store = CardStore::open_in_memory().await.unwrap();
        store
            .setting_or_insert(INSTALL_ID_KEY, "1600000000000-preset123")
            .await
            .unwrap();

        let identity = InstallIdentity::new(store);
        assert_eq!(identity.install_id().await.unwrap(), "1600000000000-preset123");
    }
}
