//! adaptest-store: Collaborators for the adaptest engine.
//!
//! JSON question banks, in-memory and JSON-file stores, and configuration
//! loading.

pub mod bank;
pub mod config;
pub mod file;
pub mod memory;

use std::path::Path;
use std::sync::Arc;

use adaptest_core::engine::Collaborators;
use adaptest_core::traits::ItemPool;

pub use bank::{load_bank_directory, parse_bank, validate_bank, JsonItemBank};
pub use config::{load_config, load_config_from, AdaptestConfig};
pub use file::{FileAbilityStore, JsonlEventLog, JsonlResultStore};
pub use memory::{InMemoryAbilityStore, InMemoryEventLog, InMemoryResultStore};

/// Collaborators persisting to JSON files under `data_dir`.
pub fn file_collaborators(pool: Arc<dyn ItemPool>, data_dir: &Path) -> Collaborators {
    Collaborators {
        pool,
        abilities: Arc::new(FileAbilityStore::new(data_dir)),
        events: Arc::new(JsonlEventLog::new(data_dir)),
        results: Arc::new(JsonlResultStore::new(data_dir)),
    }
}
