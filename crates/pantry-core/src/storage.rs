//! Persisted client state as an injected key-value store.
//!
//! [`StorageKey`] lists every key the client writes; it is the de-facto schema
//! of the persisted state.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

/// Keys of the persisted client state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Token,
    User,
    PendingLoginEmail,
    PendingToken,
    DashboardData,
    MyList,
    LastFetchTime,
    PriceTrends,
    PriceTrendsFetchTime,
}

impl StorageKey {
    pub const ALL: [Self; 9] = [
        Self::Token,
        Self::User,
        Self::PendingLoginEmail,
        Self::PendingToken,
        Self::DashboardData,
        Self::MyList,
        Self::LastFetchTime,
        Self::PriceTrends,
        Self::PriceTrendsFetchTime,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::User => "user",
            Self::PendingLoginEmail => "pendingLoginEmail",
            Self::PendingToken => "pendingToken",
            Self::DashboardData => "dashboardData",
            Self::MyList => "myList",
            Self::LastFetchTime => "lastFetchTime",
            Self::PriceTrends => "priceTrends",
            Self::PriceTrendsFetchTime => "priceTrendsFetchTime",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file i/o failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("state file {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("state store lock was poisoned")]
    Poisoned,
}

/// String key-value store with browser-storage semantics.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// Process-local store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.clear();
        Ok(())
    }
}

/// JSON-file store. Every mutation rewrites the file via a temp file + rename,
/// so a crash leaves either the old or the new state on disk.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
                    path: path.clone(),
                    source,
                })?
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let io_error = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let serialized = serde_json::to_string_pretty(entries).map_err(|source| {
            StoreError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, serialized).map_err(io_error)?;
        fs::rename(&tmp_path, &self.path).map_err(io_error)
    }

    fn mutate<F>(&self, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        let mut next = entries.clone();
        apply(&mut next);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.mutate(|entries| {
            entries.insert(key.to_owned(), value.to_owned());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.mutate(|entries| {
            entries.remove(key);
        })
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.mutate(BTreeMap::clear)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn memory_store_round_trip_and_clear() {
        let store = MemoryStore::new();

        store.set("token", "abc").expect("set");
        assert_eq!(store.get("token").expect("get").as_deref(), Some("abc"));

        store.remove("token").expect("remove");
        assert_eq!(store.get("token").expect("get"), None);

        store.set("user", "{}").expect("set");
        store.clear().expect("clear");
        assert!(store.is_empty());
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("state.json");

        {
            let store = FileStore::open(&path).expect("open");
            store.set("token", "abc").expect("set");
            store.set("lastFetchTime", "1700000000000").expect("set");
        }

        let reopened = FileStore::open(&path).expect("reopen");
        assert_eq!(reopened.get("token").expect("get").as_deref(), Some("abc"));
        assert_eq!(
            reopened.get("lastFetchTime").expect("get").as_deref(),
            Some("1700000000000")
        );
    }

    #[test]
    fn corrupt_state_file_is_reported() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").expect("write");

        let err = FileStore::open(&path).expect_err("must fail");
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn storage_keys_are_unique() {
        let mut names: Vec<_> = StorageKey::ALL.iter().map(|key| key.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), StorageKey::ALL.len());
    }
}
