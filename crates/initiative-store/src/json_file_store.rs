//! JSON-file implementation of the `KeyValueStore` trait.
//!
//! All keys live in one JSON object on disk. Every write (a single `set` or
//! a whole `set_many` batch) rewrites the file once through a temporary
//! sibling and a rename, so a crash mid-write leaves the previous contents
//! intact.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use initiative_core::error::DomainError;
use initiative_core::store::KeyValueStore;

/// File-backed key-value store.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<Map<String, Value>>,
    flushes: AtomicU64,
}

impl JsonFileStore {
    /// Opens the store at `path`. A missing file starts empty; an unreadable
    /// or malformed file is logged and also starts empty.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the parent directory cannot
    /// be created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                DomainError::Infrastructure(format!(
                    "cannot create state directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let entries = read_entries(&path);
        debug!(path = %path.display(), keys = entries.len(), "opened state file");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
            flushes: AtomicU64::new(0),
        })
    }

    /// Number of times the file has been rewritten since `open`.
    #[must_use]
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Map<String, Value>>, DomainError> {
        self.entries
            .lock()
            .map_err(|e| DomainError::Infrastructure(format!("store mutex poisoned: {e}")))
    }

    fn flush(&self, entries: &Map<String, Value>) -> Result<(), DomainError> {
        let bytes = serde_json::to_vec_pretty(entries)
            .map_err(|e| DomainError::Infrastructure(format!("state serialization failed: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes)
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|e| {
                DomainError::Infrastructure(format!(
                    "cannot write state file {}: {e}",
                    self.path.display()
                ))
            })?;
        let flushes = self.flushes.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(path = %self.path.display(), keys = entries.len(), flushes, "flushed state file");
        Ok(())
    }
}

fn read_entries(path: &Path) -> Map<String, Value> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Map::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read state file; starting empty");
            return Map::new();
        }
    };
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(entries)) => entries,
        Ok(_) => {
            warn!(path = %path.display(), "state file is not a JSON object; starting empty");
            Map::new()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "state file is malformed; starting empty");
            Map::new()
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, DomainError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), DomainError> {
        let mut entries = self.lock()?;
        entries.insert(key.to_owned(), value);
        self.flush(&entries)
    }

    fn set_many(&self, batch: Vec<(String, Value)>) -> Result<(), DomainError> {
        let mut entries = self.lock()?;
        entries.extend(batch);
        self.flush(&entries)
    }
}
