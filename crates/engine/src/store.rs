use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::atomic_io::write_text_atomic;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read store file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("store file {path} is not a JSON object of values: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode store contents: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write store file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// String key-value persistence that outlives any single scene.
pub trait KeyValueStore: fmt::Debug {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str) -> Option<String>;
    fn flush(&mut self) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// A flat JSON object on disk. Mutations stay in memory until `flush`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
    dirty: bool,
}

impl JsonFileStore {
    /// Opens `path`, treating a missing file as an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "store_file_missing");
                return Ok(Self::fresh(path));
            }
            Err(source) => return Err(StoreError::Read { path, source }),
        };

        let parsed: BTreeMap<String, serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(source) => return Err(StoreError::Decode { path, source }),
        };
        let entries = parsed
            .into_iter()
            .map(|(key, value)| match value {
                serde_json::Value::String(text) => (key, text),
                other => (key, other.to_string()),
            })
            .collect();

        Ok(Self {
            path,
            entries,
            dirty: false,
        })
    }

    /// An empty store that will overwrite `path` on the next flush.
    pub fn fresh(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Like [`JsonFileStore::open`], but an unreadable or corrupt file is
    /// logged and replaced by an empty store.
    pub fn open_or_fresh(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::open(path.clone()) {
            Ok(store) => store,
            Err(error) => {
                warn!(path = %path.display(), error = %error, "store_file_discarded");
                Self::fresh(path)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        let previous = self.entries.insert(key.to_string(), value.to_string());
        if previous.as_deref() != Some(value) {
            self.dirty = true;
        }
    }

    fn remove(&mut self, key: &str) -> Option<String> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }
        let text = serde_json::to_string_pretty(&self.entries).map_err(StoreError::Encode)?;
        write_text_atomic(&self.path, &text).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        self.dirty = false;
        debug!(path = %self.path.display(), entries = self.entries.len(), "store_flushed");
        Ok(())
    }
}
