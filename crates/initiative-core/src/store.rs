//! Key-value persistence abstraction.
//!
//! The sequencer saves and restores its state through this seam. Writes are
//! fire-and-forget from the caller's point of view: implementations report
//! failures, and callers decide whether to swallow them.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use crate::error::DomainError;

/// Key-value store holding JSON values.
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<Value>, DomainError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: Value) -> Result<(), DomainError>;

    /// Stores every entry as one write. Stores that persist to a medium
    /// override this so that a batch is written in a single step.
    fn set_many(&self, entries: Vec<(String, Value)>) -> Result<(), DomainError> {
        for (key, value) in entries {
            self.set(&key, value)?;
        }
        Ok(())
    }
}

/// Process-local store. State is lost when the process exits.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, DomainError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| DomainError::Infrastructure(format!("store mutex poisoned: {e}")))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), DomainError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| DomainError::Infrastructure(format!("store mutex poisoned: {e}")))?;
        entries.insert(key.to_owned(), value);
        Ok(())
    }

    fn set_many(&self, batch: Vec<(String, Value)>) -> Result<(), DomainError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| DomainError::Infrastructure(format!("store mutex poisoned: {e}")))?;
        entries.extend(batch);
        Ok(())
    }
}
