//! In-memory key/value store for testing.

use crate::error::StorageResult;
use crate::store::{validate_key, KeyValueStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory key/value store.
///
/// This store keeps every value in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral terminals that don't need persistence
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use possync_storage::{InMemoryStore, KeyValueStore};
///
/// let store = InMemoryStore::new();
/// store.set("offline", b"true").unwrap();
/// assert_eq!(store.get("offline").unwrap().as_deref(), Some(&b"true"[..]));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every key/value pair.
    ///
    /// Useful for asserting that a store was left untouched.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        self.entries.read().clone()
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        validate_key(key)?;
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.entries.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;

    #[test]
    fn memory_new_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn memory_set_then_get() {
        let store = InMemoryStore::new();
        store.set("alpha", b"one").unwrap();
        assert_eq!(store.get("alpha").unwrap(), Some(b"one".to_vec()));
        assert_eq!(store.get("beta").unwrap(), None);
    }

    #[test]
    fn memory_set_overwrites_whole_value() {
        let store = InMemoryStore::new();
        store.set("alpha", b"a much longer value").unwrap();
        store.set("alpha", b"short").unwrap();
        assert_eq!(store.get("alpha").unwrap(), Some(b"short".to_vec()));
    }

    #[test]
    fn memory_remove_is_idempotent() {
        let store = InMemoryStore::new();
        store.set("alpha", b"one").unwrap();
        store.remove("alpha").unwrap();
        store.remove("alpha").unwrap();
        assert!(!store.contains("alpha").unwrap());
    }

    #[test]
    fn memory_keys_are_sorted() {
        let store = InMemoryStore::new();
        store.set("zeta", b"").unwrap();
        store.set("alpha", b"").unwrap();
        assert_eq!(store.keys().unwrap(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn memory_rejects_invalid_key() {
        let store = InMemoryStore::new();
        let result = store.set("bad key", b"x");
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn memory_snapshot_is_a_copy() {
        let store = InMemoryStore::new();
        store.set("alpha", b"one").unwrap();
        let before = store.snapshot();
        store.set("alpha", b"two").unwrap();
        assert_eq!(before.get("alpha"), Some(&b"one".to_vec()));
        assert_ne!(before, store.snapshot());
    }
}
