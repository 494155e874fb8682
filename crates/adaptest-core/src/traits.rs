//! Collaborator trait definitions.
//!
//! The engine never touches storage directly. These async traits are
//! implemented by the `adaptest-store` crate (in-memory and JSON-file
//! backends) and can be backed by any database.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{AbilityKey, Item, ResponseEvent, SessionResult, StoredAbility};

// ---------------------------------------------------------------------------
// Item pool
// ---------------------------------------------------------------------------

/// Source of calibrated items, scoped by assignment.
#[async_trait]
pub trait ItemPool: Send + Sync {
    /// All items of an assignment that carry a complete parameter set.
    async fn items_for(&self, assignment_id: &str) -> Result<Vec<Item>, StoreError>;
}

// ---------------------------------------------------------------------------
// Ability store
// ---------------------------------------------------------------------------

/// Per-(examinee, course) ability storage with optimistic concurrency.
///
/// Writes go through [`AbilityStore::compare_and_swap`] so that two sessions
/// submitted at once for the same key never blend against a stale read.
#[async_trait]
pub trait AbilityStore: Send + Sync {
    /// Current stored ability, if any.
    async fn load(&self, key: &AbilityKey) -> Result<Option<StoredAbility>, StoreError>;

    /// Write `theta` if the stored version still equals `expected_version`
    /// (`None` = no row yet). Returns `false` when another writer got there first.
    /// A successful swap leaves the row at `expected_version + 1` (1 for a new row).
    async fn compare_and_swap(
        &self,
        key: &AbilityKey,
        expected_version: Option<u64>,
        theta: f64,
    ) -> Result<bool, StoreError>;

    /// Stored ability, or 0.0 for an examinee never seen in this course.
    async fn get(&self, key: &AbilityKey) -> Result<f64, StoreError> {
        Ok(self.load(key).await?.map_or(0.0, |a| a.theta))
    }
}

// ---------------------------------------------------------------------------
// Logs
// ---------------------------------------------------------------------------

/// Append-only sink for per-item response events.
#[async_trait]
pub trait EventLog: Send + Sync {
    async fn append(&self, event: &ResponseEvent) -> Result<(), StoreError>;
}

/// Create-only sink for session results.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn create(&self, result: &SessionResult) -> Result<(), StoreError>;
}
