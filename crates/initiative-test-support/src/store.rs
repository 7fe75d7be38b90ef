//! Test stores — mock `KeyValueStore` implementations for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use initiative_core::error::DomainError;
use initiative_core::store::KeyValueStore;
use serde_json::Value;

/// A store that keeps every value and records the order of writes.
#[derive(Debug, Default)]
pub struct RecordingStore {
    entries: Mutex<HashMap<String, Value>>,
    writes: Mutex<Vec<String>>,
    batches: Mutex<usize>,
}

impl RecordingStore {
    /// Creates an empty recording store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `entries`.
    #[must_use]
    pub fn with_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let store = Self::new();
        store
            .entries
            .lock()
            .unwrap()
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v)));
        store
    }

    /// Returns the value currently stored under `key`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn value(&self, key: &str) -> Option<Value> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    /// Returns every key written so far, in write order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn written_keys(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    /// Returns how many writes reached the store: one per `set` and one per
    /// `set_many` batch.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn batch_count(&self) -> usize {
        *self.batches.lock().unwrap()
    }
}

impl KeyValueStore for RecordingStore {
    fn get(&self, key: &str) -> Result<Option<Value>, DomainError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), DomainError> {
        *self.batches.lock().unwrap() += 1;
        self.writes.lock().unwrap().push(key.to_owned());
        self.entries.lock().unwrap().insert(key.to_owned(), value);
        Ok(())
    }

    fn set_many(&self, batch: Vec<(String, Value)>) -> Result<(), DomainError> {
        *self.batches.lock().unwrap() += 1;
        let mut writes = self.writes.lock().unwrap();
        let mut entries = self.entries.lock().unwrap();
        for (key, value) in batch {
            writes.push(key.clone());
            entries.insert(key, value);
        }
        Ok(())
    }
}

/// A store that always returns an infrastructure error. Useful for testing
/// that persistence failures never surface from the sequencer.
#[derive(Debug)]
pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<Value>, DomainError> {
        Err(DomainError::Infrastructure("storage unavailable".into()))
    }

    fn set(&self, _key: &str, _value: Value) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("storage unavailable".into()))
    }
}
