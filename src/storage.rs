//! Blacklist storage contract
//!
//! The blacklist only needs a small key-value surface: read, write with a
//! lifetime, write forever, delete one key, delete everything. Backends are
//! expected to give per-key write atomicity; no compare-and-swap is needed.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use jwtauth::clock::FixedClock;
//! use jwtauth::storage::{InMemoryStorage, Storage};
//!
//! let clock = Arc::new(FixedClock::new(0));
//! let storage = InMemoryStorage::new(clock.clone());
//!
//! storage.add("foo", serde_json::json!({"valid_until": 0}), 1).unwrap();
//! assert!(storage.get("foo").unwrap().is_some());
//!
//! clock.advance(60);
//! assert!(storage.get("foo").unwrap().is_none());
//! ```

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;

use crate::clock::{system_clock, SharedClock};
use crate::error::StorageError;

/// Key-value backend used by the blacklist
pub trait Storage: Send + Sync {
    /// Value stored under `key`, `None` when absent or elapsed
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Store `value` for `minutes` minutes
    fn add(&self, key: &str, value: Value, minutes: i64) -> Result<(), StorageError>;

    /// Store `value` with no expiry
    fn forever(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Remove `key`, reporting whether it existed
    fn destroy(&self, key: &str) -> Result<bool, StorageError>;

    /// Remove every entry
    fn flush(&self) -> Result<(), StorageError>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<i64>,
}

impl Entry {
    fn is_live(&self, now: i64) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Process-local backend with per-entry expiry read from a clock
pub struct InMemoryStorage {
    entries: RwLock<HashMap<String, Entry>>,
    clock: SharedClock,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new(system_clock())
    }
}

impl std::fmt::Debug for InMemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.entries.read().map(|e| e.len()).unwrap_or_default();
        f.debug_struct("InMemoryStorage")
            .field("entries", &len)
            .finish_non_exhaustive()
    }
}

impl InMemoryStorage {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Number of live entries
    pub fn len(&self) -> Result<usize, StorageError> {
        let now = self.clock.now();
        Ok(self.read()?.values().filter(|e| e.is_live(now)).count())
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Entry>>, StorageError> {
        self.entries
            .read()
            .map_err(|_| StorageError::Unavailable("storage lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Entry>>, StorageError> {
        self.entries
            .write()
            .map_err(|_| StorageError::Unavailable("storage lock poisoned".to_string()))
    }
}

impl Storage for InMemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let now = self.clock.now();
        Ok(self
            .read()?
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    fn add(&self, key: &str, value: Value, minutes: i64) -> Result<(), StorageError> {
        let now = self.clock.now();
        let mut entries = self.write()?;
        // elapsed entries are dropped on write
        entries.retain(|_, entry| entry.is_live(now));
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Some(now.saturating_add(minutes.saturating_mul(60))),
            },
        );
        Ok(())
    }

    fn forever(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.write()?.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: None,
            },
        );
        Ok(())
    }

    fn destroy(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.write()?.remove(key).is_some())
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.write()?.clear();
        Ok(())
    }
}
