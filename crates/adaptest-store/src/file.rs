//! JSON-file collaborators rooted at a data directory.
//!
//! Layout:
//! - `abilities.json`: every stored ability, rewritten atomically on each swap
//! - `abilities.lock`: present while a swap is in progress
//! - `events.jsonl`: one response event per line
//! - `results.jsonl`: one session result per line

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use adaptest_core::error::StoreError;
use adaptest_core::model::{AbilityKey, ResponseEvent, SessionResult, StoredAbility};
use adaptest_core::traits::{AbilityStore, EventLog, ResultStore};

pub const ABILITIES_FILE: &str = "abilities.json";
pub const EVENTS_FILE: &str = "events.jsonl";
pub const RESULTS_FILE: &str = "results.jsonl";
pub const LOCK_FILE: &str = "abilities.lock";

/// How long a swap waits for another process to release the lock.
const LOCK_TIMEOUT: Duration = Duration::from_secs(10);
/// A lock file older than this was left by a crashed process.
const STALE_LOCK_AGE: Duration = Duration::from_secs(30);
const LOCK_RETRY: Duration = Duration::from_millis(2);

/// Exclusive lock held as a `create_new` lock file; removed on drop.
struct LockFile {
    path: PathBuf,
}

impl LockFile {
    async fn acquire(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let deadline = SystemTime::now() + LOCK_TIMEOUT;
        loop {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
                .await
            {
                Ok(_) => {
                    return Ok(Self {
                        path: path.to_path_buf(),
                    })
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if is_stale(path).await {
                        tracing::warn!(path = %path.display(), "removing stale lock file");
                        let _ = tokio::fs::remove_file(path).await;
                        continue;
                    }
                    if SystemTime::now() >= deadline {
                        return Err(StoreError::Unavailable(format!(
                            "timed out waiting for {}",
                            path.display()
                        )));
                    }
                    tokio::time::sleep(LOCK_RETRY).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn is_stale(path: &Path) -> bool {
    let Ok(meta) = tokio::fs::metadata(path).await else {
        return false;
    };
    meta.modified()
        .ok()
        .and_then(|m| m.elapsed().ok())
        .is_some_and(|age| age > STALE_LOCK_AGE)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AbilityRow {
    examinee_id: String,
    course_id: String,
    #[serde(flatten)]
    ability: StoredAbility,
}

/// Ability store persisted as a single JSON document.
///
/// Swaps are serialized across processes by a lock file around the
/// read-modify-write of the document; the mutex only keeps tasks of one
/// process from spinning on that file.
pub struct FileAbilityStore {
    path: PathBuf,
    lock_path: PathBuf,
    lock: Mutex<()>,
}

impl FileAbilityStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(ABILITIES_FILE),
            lock_path: data_dir.join(LOCK_FILE),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored abilities, ordered by examinee then course.
    pub async fn all(&self) -> Result<Vec<(AbilityKey, StoredAbility)>, StoreError> {
        Ok(self
            .read_rows()
            .await?
            .into_iter()
            .map(|((examinee_id, course_id), ability)| {
                (AbilityKey::new(examinee_id, course_id), ability)
            })
            .collect())
    }

    async fn read_rows(&self) -> Result<BTreeMap<(String, String), StoredAbility>, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        let rows: Vec<AbilityRow> = serde_json::from_str(&content)?;
        Ok(rows
            .into_iter()
            .map(|r| ((r.examinee_id, r.course_id), r.ability))
            .collect())
    }

    async fn write_rows(
        &self,
        rows: BTreeMap<(String, String), StoredAbility>,
    ) -> Result<(), StoreError> {
        let rows: Vec<AbilityRow> = rows
            .into_iter()
            .map(|((examinee_id, course_id), ability)| AbilityRow {
                examinee_id,
                course_id,
                ability,
            })
            .collect();
        let json = serde_json::to_string_pretty(&rows)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn row_key(key: &AbilityKey) -> (String, String) {
    (key.examinee_id.clone(), key.course_id.clone())
}

#[async_trait]
impl AbilityStore for FileAbilityStore {
    async fn load(&self, key: &AbilityKey) -> Result<Option<StoredAbility>, StoreError> {
        Ok(self.read_rows().await?.remove(&row_key(key)))
    }

    async fn compare_and_swap(
        &self,
        key: &AbilityKey,
        expected_version: Option<u64>,
        theta: f64,
    ) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let _file_lock = LockFile::acquire(&self.lock_path).await?;
        let mut rows = self.read_rows().await?;
        let k = row_key(key);
        let current = rows.get(&k).map(|row| row.version);
        if current != expected_version {
            tracing::debug!(%key, ?current, ?expected_version, "ability version moved");
            return Ok(false);
        }
        rows.insert(
            k,
            StoredAbility {
                theta,
                version: current.map_or(1, |v| v + 1),
                updated_at: Utc::now(),
            },
        );
        self.write_rows(rows).await?;
        Ok(true)
    }
}

/// Append one JSON line to `path`, creating the file and its parent.
async fn append_line<T: Serialize>(path: &Path, record: &T) -> Result<(), StoreError> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

/// Read every JSON line of `path`. A missing file reads as empty.
pub async fn read_lines<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>, StoreError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(StoreError::from))
        .collect()
}

/// Response events appended to `events.jsonl`.
pub struct JsonlEventLog {
    path: PathBuf,
}

impl JsonlEventLog {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(EVENTS_FILE),
        }
    }

    pub async fn events(&self) -> Result<Vec<ResponseEvent>, StoreError> {
        read_lines(&self.path).await
    }
}

#[async_trait]
impl EventLog for JsonlEventLog {
    async fn append(&self, event: &ResponseEvent) -> Result<(), StoreError> {
        append_line(&self.path, event).await
    }
}

/// Session results appended to `results.jsonl`.
pub struct JsonlResultStore {
    path: PathBuf,
}

impl JsonlResultStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(RESULTS_FILE),
        }
    }

    pub async fn results(&self) -> Result<Vec<SessionResult>, StoreError> {
        read_lines(&self.path).await
    }
}

#[async_trait]
impl ResultStore for JsonlResultStore {
    async fn create(&self, result: &SessionResult) -> Result<(), StoreError> {
        append_line(&self.path, result).await
    }
}
