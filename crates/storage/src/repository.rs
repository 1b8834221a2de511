use async_trait::async_trait;
use reels_core::model::{QuestionId, ReviewCard, StreakState};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::records::{ReviewCardRecord, StreakRecord};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// The backing store cannot be read or written (quota exceeded, disabled,
    /// database failure). Callers may fall back to a memory-only mode.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── KEY-VALUE STORE ───────────────────────────────────────────────────────────
//

/// Minimal local key-value persistence, shaped after browser local storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the store cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write every entry or none of them.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the write is rejected; no entry is
    /// written in that case.
    async fn set_many(&self, entries: &[(String, String)]) -> Result<(), StorageError>;

    /// Remove every key or none of them. Missing keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the store cannot be written.
    async fn remove_many(&self, keys: &[String]) -> Result<(), StorageError>;

    /// All keys starting with `prefix`, in ascending key order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the store cannot be read.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the write is rejected.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.set_many(&[(key.to_owned(), value.to_owned())]).await
    }

    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the store cannot be written.
    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.remove_many(&[key.to_owned()]).await
    }
}

#[derive(Default)]
struct MemoryState {
    entries: BTreeMap<String, String>,
    quota: Option<usize>,
    disabled: bool,
}

/// In-memory store for tests, prototyping and degraded memory-only mode.
///
/// Clones share the same entries.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects writes which would exceed `max_entries` keys.
    #[must_use]
    pub fn with_quota(max_entries: usize) -> Self {
        let store = Self::new();
        if let Ok(mut guard) = store.state.lock() {
            guard.quota = Some(max_entries);
        }
        store
    }

    /// Store that rejects every read and write, like storage disabled by the
    /// browsing environment.
    #[must_use]
    pub fn disabled() -> Self {
        let store = Self::new();
        store.set_disabled(true);
        store
    }

    /// Toggle the disabled state for this store and all of its clones.
    pub fn set_disabled(&self, disabled: bool) {
        if let Ok(mut guard) = self.state.lock() {
            guard.disabled = disabled;
        }
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().map(|g| g.entries.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StorageError> {
        let guard = self
            .state
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        if guard.disabled {
            return Err(StorageError::Unavailable("storage is disabled".into()));
        }
        Ok(guard)
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.entries.get(key).cloned())
    }

    async fn set_many(&self, entries: &[(String, String)]) -> Result<(), StorageError> {
        let mut guard = self.lock()?;

        if let Some(quota) = guard.quota {
            let mut added: Vec<&str> = entries
                .iter()
                .map(|(k, _)| k.as_str())
                .filter(|k| !guard.entries.contains_key(*k))
                .collect();
            added.sort_unstable();
            added.dedup();
            if guard.entries.len() + added.len() > quota {
                return Err(StorageError::Unavailable(format!(
                    "quota of {quota} entries exceeded"
                )));
            }
        }

        for (key, value) in entries {
            guard.entries.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn remove_many(&self, keys: &[String]) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        for key in keys {
            guard.entries.remove(key);
        }
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .entries
            .range(prefix.to_owned()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

//
// ─── SRS REPOSITORY ────────────────────────────────────────────────────────────
//

pub const CARD_KEY_PREFIX: &str = "srs:card:";
pub const STATS_KEY: &str = "srs:stats";

/// Typed access to review cards and streak counters over a `KeyValueStore`.
///
/// Cards live under `srs:card:<questionId>`, streak counters under `srs:stats`,
/// both as camelCase JSON records.
#[derive(Clone)]
pub struct SrsRepository {
    store: Arc<dyn KeyValueStore>,
}

impl SrsRepository {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn card_key(id: &QuestionId) -> String {
        format!("{CARD_KEY_PREFIX}{id}")
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the store fails or the record cannot be decoded.
    pub async fn get_card(&self, id: &QuestionId) -> Result<Option<ReviewCard>, StorageError> {
        match self.store.get(&Self::card_key(id)).await? {
            Some(raw) => ReviewCardRecord::decode(&raw)?.into_card().map(Some),
            None => Ok(None),
        }
    }

    /// Every persisted card, in key order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store fails or any record cannot be decoded.
    pub async fn all_cards(&self) -> Result<Vec<ReviewCard>, StorageError> {
        let keys = self.store.keys(CARD_KEY_PREFIX).await?;
        let mut cards = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(raw) = self.store.get(&key).await? {
                cards.push(ReviewCardRecord::decode(&raw)?.into_card()?);
            }
        }
        Ok(cards)
    }

    /// Streak counters, or a fresh state if none were persisted yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store fails or the record cannot be decoded.
    pub async fn get_streak(&self) -> Result<StreakState, StorageError> {
        match self.store.get(STATS_KEY).await? {
            Some(raw) => Ok(StreakRecord::decode(&raw)?.into_streak()),
            None => Ok(StreakState::default()),
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the card cannot be encoded or stored.
    pub async fn save_card(&self, card: &ReviewCard) -> Result<(), StorageError> {
        self.save_review(card, None).await
    }

    /// Replace the card (and optionally the streak counters) in one write.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if encoding fails or the store rejects the write;
    /// nothing is written in that case.
    pub async fn save_review(
        &self,
        card: &ReviewCard,
        streak: Option<&StreakState>,
    ) -> Result<(), StorageError> {
        let mut entries = vec![(
            Self::card_key(card.question_id()),
            ReviewCardRecord::from_card(card).encode()?,
        )];
        if let Some(streak) = streak {
            entries.push((STATS_KEY.to_owned(), StreakRecord::from_streak(streak).encode()?));
        }
        self.store.set_many(&entries).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be written.
    pub async fn delete_card(&self, id: &QuestionId) -> Result<(), StorageError> {
        self.store.remove(&Self::card_key(id)).await
    }

    /// Remove every card and the streak counters.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read or written.
    pub async fn clear(&self) -> Result<usize, StorageError> {
        let mut keys = self.store.keys(CARD_KEY_PREFIX).await?;
        let removed = keys.len();
        keys.push(STATS_KEY.to_owned());
        self.store.remove_many(&keys).await?;
        Ok(removed)
    }
}
