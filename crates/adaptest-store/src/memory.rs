//! In-memory collaborators for tests and single-process use.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use adaptest_core::error::StoreError;
use adaptest_core::model::{AbilityKey, ResponseEvent, SessionResult, StoredAbility};
use adaptest_core::traits::{AbilityStore, EventLog, ResultStore};

/// Versioned ability rows held in a map.
#[derive(Default)]
pub struct InMemoryAbilityStore {
    rows: RwLock<HashMap<AbilityKey, StoredAbility>>,
    swap_count: AtomicU32,
    unavailable: AtomicBool,
}

impl InMemoryAbilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-seeded with rows at version 1.
    pub fn with_abilities(rows: impl IntoIterator<Item = (AbilityKey, f64)>) -> Self {
        let now = Utc::now();
        let rows = rows
            .into_iter()
            .map(|(key, theta)| {
                (
                    key,
                    StoredAbility {
                        theta,
                        version: 1,
                        updated_at: now,
                    },
                )
            })
            .collect();
        Self {
            rows: RwLock::new(rows),
            ..Self::default()
        }
    }

    /// Number of successful compare-and-swap writes.
    pub fn swap_count(&self) -> u32 {
        self.swap_count.load(Ordering::Relaxed)
    }

    /// Make every call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Snapshot of all rows.
    pub async fn snapshot(&self) -> HashMap<AbilityKey, StoredAbility> {
        self.rows.read().await.clone()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("ability store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl AbilityStore for InMemoryAbilityStore {
    async fn load(&self, key: &AbilityKey) -> Result<Option<StoredAbility>, StoreError> {
        self.check_available()?;
        Ok(self.rows.read().await.get(key).cloned())
    }

    async fn compare_and_swap(
        &self,
        key: &AbilityKey,
        expected_version: Option<u64>,
        theta: f64,
    ) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut rows = self.rows.write().await;
        let current = rows.get(key).map(|row| row.version);
        if current != expected_version {
            return Ok(false);
        }
        rows.insert(
            key.clone(),
            StoredAbility {
                theta,
                version: current.map_or(1, |v| v + 1),
                updated_at: Utc::now(),
            },
        );
        self.swap_count.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }
}

/// Response events kept in insertion order.
#[derive(Default)]
pub struct InMemoryEventLog {
    events: RwLock<Vec<ResponseEvent>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<ResponseEvent> {
        self.events.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(&self, event: &ResponseEvent) -> Result<(), StoreError> {
        self.events.write().await.push(event.clone());
        Ok(())
    }
}

/// Session results kept in insertion order.
#[derive(Default)]
pub struct InMemoryResultStore {
    results: RwLock<Vec<SessionResult>>,
    unavailable: AtomicBool,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `create` fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    pub async fn results(&self) -> Vec<SessionResult> {
        self.results.read().await.clone()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn create(&self, result: &SessionResult) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("result store offline".into()));
        }
        self.results.write().await.push(result.clone());
        Ok(())
    }
}
