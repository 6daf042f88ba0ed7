use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::settings::{default_config_dir, SettingsError};

/// Keys of the independently persisted state blobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    ConnectionHistory,
    QueryHistory,
    Bookmarks,
    Theme,
    SidebarCollapsed,
}

impl StateKey {
    pub const ALL: [Self; 5] = [
        Self::ConnectionHistory,
        Self::QueryHistory,
        Self::Bookmarks,
        Self::Theme,
        Self::SidebarCollapsed,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionHistory => "connection-history",
            Self::QueryHistory => "query-history",
            Self::Bookmarks => "query-bookmarks",
            Self::Theme => "theme",
            Self::SidebarCollapsed => "sidebar-collapsed",
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to resolve state directory: {0}")]
    Config(#[from] SettingsError),
    #[error("failed to read state file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create state directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write state file at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize `{key}`: {source}")]
    Serialize {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Durable key-value storage for text blobs.
///
/// A missing key reads as `Ok(None)`. Writes replace the whole value; a
/// reader never observes a partially written blob.
pub trait StateStore: Send + Sync {
    fn read(&self, key: StateKey) -> Result<Option<String>, StorageError>;
    fn write(&self, key: StateKey, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: StateKey) -> Result<(), StorageError>;
}

/// Loads and decodes `key`, substituting the default when the blob is
/// missing or unreadable. Decode failures are logged, never returned.
pub fn load_or_default<T>(store: &dyn StateStore, key: StateKey) -> T
where
    T: DeserializeOwned + Default,
{
    let raw = match store.read(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(error) => {
            tracing::warn!(key = key.as_str(), %error, "failed to read persisted state");
            return T::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(key = key.as_str(), %error, "discarding undecodable persisted state");
            T::default()
        }
    }
}

pub fn save<T>(store: &dyn StateStore, key: StateKey, value: &T) -> Result<(), StorageError>
where
    T: Serialize + ?Sized,
{
    let rendered = serde_json::to_string(value).map_err(|source| StorageError::Serialize {
        key: key.as_str(),
        source,
    })?;
    store.write(key, &rendered)
}

/// Stores each key as `<key>.json` inside one directory.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn open_default() -> Result<Self, StorageError> {
        Ok(Self::new(default_config_dir()?.join("state")))
    }

    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: StateKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.as_str()))
    }
}

impl StateStore for FileStateStore {
    fn read(&self, key: StateKey) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(source) if source.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Read { path, source }),
        }
    }

    fn write(&self, key: StateKey, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|source| StorageError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.path_for(key);
        let staging = self.dir.join(format!(".{}.json.tmp", key.as_str()));
        fs::write(&staging, value).map_err(|source| StorageError::Write {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &path).map_err(|source| StorageError::Write { path, source })
    }

    fn remove(&self, key: StateKey) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Write { path, source }),
        }
    }
}

/// Volatile store, for sessions that should not touch disk.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: Mutex<HashMap<StateKey, String>>,
}

impl MemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn read(&self, key: StateKey) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(&key).cloned())
    }

    fn write(&self, key: StateKey, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: StateKey) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(&key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::{
        load_or_default, save, FileStateStore, MemoryStateStore, StateKey, StateStore,
    };

    #[test]
    fn missing_key_loads_default() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let store = FileStateStore::new(temp_dir.path().join("state"));

        let history: Vec<String> = load_or_default(&store, StateKey::QueryHistory);
        assert!(history.is_empty());
        assert!(store
            .read(StateKey::QueryHistory)
            .expect("read should succeed")
            .is_none());
    }

    #[test]
    fn save_then_load_through_files() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let store = FileStateStore::new(temp_dir.path().join("state"));

        save(&store, StateKey::SidebarCollapsed, &true).expect("save should succeed");
        let collapsed: bool = load_or_default(&store, StateKey::SidebarCollapsed);
        assert!(collapsed);

        let on_disk = fs::read_to_string(store.dir().join("sidebar-collapsed.json"))
            .expect("state file should exist");
        assert_eq!(on_disk, "true");
        assert!(!store.dir().join(".sidebar-collapsed.json.tmp").exists());
    }

    #[test]
    fn corrupt_blob_fails_soft_to_default() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let store = FileStateStore::new(temp_dir.path());
        store
            .write(StateKey::Bookmarks, "{not json")
            .expect("raw write should succeed");

        let bookmarks: Vec<String> = load_or_default(&store, StateKey::Bookmarks);
        assert!(bookmarks.is_empty());
    }

    #[test]
    fn keys_are_independent_and_removable() {
        let store = MemoryStateStore::new();
        save(&store, StateKey::Theme, "dark").expect("save should succeed");
        save(&store, StateKey::SidebarCollapsed, &false).expect("save should succeed");

        store.remove(StateKey::Theme).expect("remove should succeed");
        store
            .remove(StateKey::Theme)
            .expect("second remove should stay quiet");

        let theme: String = load_or_default(&store, StateKey::Theme);
        assert!(theme.is_empty());
        let collapsed: bool = load_or_default(&store, StateKey::SidebarCollapsed);
        assert!(!collapsed);
    }

    #[test]
    fn key_names_are_unique() {
        let mut names = StateKey::ALL.map(StateKey::as_str).to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), StateKey::ALL.len());
    }
}
