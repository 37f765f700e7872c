//! On-disk work-item store: `.sdd/work_items.json`.
//!
//! The file holds `{ metadata, work_items }` with items keyed by id in
//! ascending order. Every mutation is a read-modify-write under the exclusive
//! advisory lock at `.sdd/lock`. Writes go to a temporary file that is then
//! renamed over the store, so readers see either the old or the new contents.
//!
//! Serialization is deterministic: saving a loaded store without changes
//! reproduces the file byte for byte.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::ProjectConfig;
use crate::error::{Result, SddError};
use crate::graph::cycles::find_cycle;
use crate::graph::deps::DependencyGraph;
use crate::lock::{ReadLock, StoreLock};
use crate::model::item::WorkItem;
use crate::model::metadata::{StoreMetadata, recompute_metadata};

pub const SDD_DIR: &str = ".sdd";
pub const STORE_FILE: &str = "work_items.json";
pub const LOCK_FILE: &str = "lock";
pub const CONFIG_FILE: &str = "config.toml";

/// The full persisted document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreFile {
    pub metadata: StoreMetadata,
    pub work_items: BTreeMap<String, WorkItem>,
}

impl StoreFile {
    #[must_use]
    pub fn empty(now: DateTime<Utc>) -> Self {
        let work_items = BTreeMap::new();
        Self {
            metadata: recompute_metadata(&work_items, now),
            work_items,
        }
    }
}

/// Handle on a project's store. Holds no data; every call reads the file.
#[derive(Debug, Clone)]
pub struct WorkItemStore {
    root: PathBuf,
    lock_timeout: Duration,
}

impl WorkItemStore {
    /// Create `.sdd/` with an empty store and a default config if they do
    /// not exist yet. Existing files are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SddError::Io`] if the directory or files cannot be written.
    #[instrument(skip_all, fields(root = %root.display()))]
    pub fn init(root: &Path) -> Result<Self> {
        let dir = root.join(SDD_DIR);
        fs::create_dir_all(&dir).map_err(|source| SddError::Io {
            path: dir.clone(),
            source,
        })?;

        let config_path = dir.join(CONFIG_FILE);
        if !config_path.exists() {
            let rendered = toml::to_string_pretty(&ProjectConfig::default()).map_err(|e| {
                SddError::Config {
                    path: config_path.clone(),
                    message: e.to_string(),
                }
            })?;
            write_atomic(&config_path, rendered.as_bytes())?;
        }

        let store = Self {
            root: root.to_path_buf(),
            lock_timeout: ProjectConfig::default().store.lock_timeout(),
        };
        if store.store_path().exists() {
            tracing::info!("store already initialized");
        } else {
            let _lock = StoreLock::acquire(&store.lock_path(), store.lock_timeout)?;
            store.write(&StoreFile::empty(Utc::now()))?;
            tracing::info!(path = %store.store_path().display(), "store initialized");
        }
        Ok(store)
    }

    /// Open an initialized store.
    ///
    /// # Errors
    ///
    /// Returns [`SddError::NotInitialized`] if `.sdd/work_items.json` is
    /// missing.
    pub fn open(root: &Path, lock_timeout: Duration) -> Result<Self> {
        let store = Self {
            root: root.to_path_buf(),
            lock_timeout,
        };
        if !store.store_path().exists() {
            return Err(SddError::NotInitialized {
                path: root.join(SDD_DIR),
            });
        }
        Ok(store)
    }

    /// Walk up from `start` to the nearest directory containing `.sdd/`.
    #[must_use]
    pub fn discover(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            if current.join(SDD_DIR).is_dir() {
                return Some(current);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.root.join(SDD_DIR).join(STORE_FILE)
    }

    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(SDD_DIR).join(LOCK_FILE)
    }

    /// Read a consistent snapshot under a shared lock.
    ///
    /// # Errors
    ///
    /// Lock timeout, I/O failure, malformed JSON, or a structurally invalid
    /// graph (unknown dependency ids, cycles).
    #[instrument(skip(self), fields(path = %self.store_path().display()))]
    pub fn load(&self) -> Result<StoreFile> {
        let _lock = ReadLock::acquire(&self.lock_path(), self.lock_timeout)?;
        self.read()
    }

    /// Write `file` exactly as given, without recomputing metadata.
    ///
    /// # Errors
    ///
    /// Lock timeout or I/O failure.
    #[instrument(skip(self, file), fields(items = file.work_items.len()))]
    pub fn save(&self, file: &StoreFile) -> Result<()> {
        let _lock = StoreLock::acquire(&self.lock_path(), self.lock_timeout)?;
        self.write(file)
    }

    /// Run `apply` on the current items under the exclusive lock.
    ///
    /// When `apply` succeeds and changed anything, metadata is recomputed and
    /// the store is written atomically. When it fails nothing is written.
    ///
    /// # Errors
    ///
    /// Whatever `apply` returns, plus lock, I/O, and load errors.
    #[instrument(skip(self, apply))]
    pub fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, WorkItem>, DateTime<Utc>) -> Result<T>,
    ) -> Result<T> {
        let _lock = StoreLock::acquire(&self.lock_path(), self.lock_timeout)?;
        let mut file = self.read()?;
        let before = file.work_items.clone();
        let now = Utc::now();

        let out = apply(&mut file.work_items, now)?;

        if file.work_items == before {
            tracing::debug!("mutation left store unchanged, not writing");
        } else {
            file.metadata = recompute_metadata(&file.work_items, now);
            self.write(&file)?;
        }
        Ok(out)
    }

    fn read(&self) -> Result<StoreFile> {
        let path = self.store_path();
        let raw = fs::read(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                SddError::NotInitialized {
                    path: self.root.join(SDD_DIR),
                }
            } else {
                SddError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        let file: StoreFile = serde_json::from_slice(&raw)
            .map_err(|source| SddError::CorruptStore { path: path.clone(), source })?;
        validate(&file)?;
        tracing::debug!(items = file.work_items.len(), "store loaded");
        Ok(file)
    }

    fn write(&self, file: &StoreFile) -> Result<()> {
        let path = self.store_path();
        let mut rendered = serde_json::to_vec_pretty(file)
            .map_err(|source| SddError::CorruptStore { path: path.clone(), source })?;
        rendered.push(b'\n');
        write_atomic(&path, &rendered)?;
        tracing::debug!(path = %path.display(), bytes = rendered.len(), "store written");
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(|source| SddError::Io {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| SddError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Reject documents that break structural invariants.
fn validate(file: &StoreFile) -> Result<()> {
    for (key, item) in &file.work_items {
        if key != item.id() {
            return Err(SddError::validation(
                "work_items",
                format!("key '{key}' does not match item id '{}'", item.id()),
            ));
        }
        let missing: Vec<String> = item
            .dependencies()
            .iter()
            .filter(|d| !file.work_items.contains_key(d.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(SddError::DependencyNotFound {
                item_id: key.clone(),
                missing,
            });
        }
    }
    if let Some(cycle) = find_cycle(&DependencyGraph::new(&file.work_items)) {
        return Err(SddError::DependencyCycle(cycle));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::deps::{add_dependency, insert_item};
    use crate::model::item::{Priority, Status, WorkItemType};
    use std::collections::BTreeSet;

    fn init() -> (tempfile::TempDir, WorkItemStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkItemStore::init(dir.path()).unwrap();
        (dir, store)
    }

    fn create(store: &WorkItemStore, id: &str, deps: &[&str]) {
        store
            .mutate(|items, now| {
                let item = WorkItem::new(id, WorkItemType::Feature, id, Priority::Medium, now);
                let deps: BTreeSet<String> = deps.iter().map(|d| (*d).to_string()).collect();
                insert_item(items, item, deps)
            })
            .unwrap();
    }

    #[test]
    fn init_creates_empty_store_and_config() {
        let (dir, store) = init();
        assert!(dir.path().join(".sdd/config.toml").exists());
        let file = store.load().unwrap();
        assert!(file.work_items.is_empty());
        assert_eq!(file.metadata.total_items, 0);

        // Idempotent.
        WorkItemStore::init(dir.path()).unwrap();
        assert_eq!(store.load().unwrap(), file);
    }

    #[test]
    fn open_requires_init() {
        let dir = tempfile::tempdir().unwrap();
        let err = WorkItemStore::open(dir.path(), Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, SddError::NotInitialized { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn mutate_recomputes_metadata() {
        let (_dir, store) = init();
        create(&store, "a", &[]);
        create(&store, "b", &["a"]);

        let file = store.load().unwrap();
        assert_eq!(file.metadata.total_items, 2);
        assert_eq!(file.metadata.count(Status::NotStarted), 2);
        assert!(file.metadata.matches(&file.work_items));
    }

    #[test]
    fn failed_mutation_writes_nothing() {
        let (_dir, store) = init();
        create(&store, "d", &[]);
        create(&store, "e", &["d"]);
        let before = fs::read(store.store_path()).unwrap();

        let err = store
            .mutate(|items, now| add_dependency(items, "d", "e", now))
            .unwrap_err();
        assert!(matches!(err, SddError::DependencyCycle(_)));
        assert_eq!(fs::read(store.store_path()).unwrap(), before);
    }

    #[test]
    fn unchanged_mutation_does_not_touch_file() {
        let (_dir, store) = init();
        create(&store, "a", &[]);
        let before = fs::read(store.store_path()).unwrap();
        let changed = store.mutate(|_, _| Ok(false)).unwrap();
        assert!(!changed);
        assert_eq!(fs::read(store.store_path()).unwrap(), before);
    }

    #[test]
    fn save_of_loaded_store_is_byte_identical() {
        let (_dir, store) = init();
        create(&store, "a", &[]);
        create(&store, "b", &["a"]);
        let before = fs::read(store.store_path()).unwrap();

        let file = store.load().unwrap();
        store.save(&file).unwrap();
        assert_eq!(fs::read(store.store_path()).unwrap(), before);
    }

    #[test]
    fn corrupt_json_is_reported() {
        let (_dir, store) = init();
        fs::write(store.store_path(), b"{ not json").unwrap();
        assert!(matches!(store.load(), Err(SddError::CorruptStore { .. })));
    }

    #[test]
    fn hand_edited_dangling_reference_is_rejected() {
        let (_dir, store) = init();
        create(&store, "a", &[]);
        let raw = fs::read_to_string(store.store_path()).unwrap();
        let mut doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        doc["work_items"]["a"]["dependencies"] = serde_json::json!(["ghost"]);
        fs::write(store.store_path(), doc.to_string()).unwrap();

        assert!(matches!(
            store.load(),
            Err(SddError::DependencyNotFound { .. })
        ));
    }

    #[test]
    fn discover_walks_up() {
        let (dir, _store) = init();
        let nested = dir.path().join("src/deep");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(WorkItemStore::discover(&nested).as_deref(), Some(dir.path()));
    }

    #[test]
    fn held_lock_times_out_mutation() {
        let (_dir, store) = init();
        let store = WorkItemStore::open(store.root(), Duration::from_millis(20)).unwrap();
        let _held = StoreLock::acquire(&store.lock_path(), Duration::from_millis(50)).unwrap();
        let err = store.mutate(|_, _| Ok(())).unwrap_err();
        assert!(matches!(err, SddError::ConcurrentModification { .. }));
    }
}
