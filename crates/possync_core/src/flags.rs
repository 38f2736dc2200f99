//! The persisted `offline` flag.

use crate::error::CoreResult;
use crate::keys;
use possync_storage::{JsonStoreExt, KeyValueStore};
use std::sync::Arc;

/// Durable `offline` flag.
///
/// Read fresh on every call and never cached, so a flag written by one
/// cycle is what the next cycle (or another process on the same store)
/// sees. An unset flag reads as online.
pub struct OfflineFlag {
    store: Arc<dyn KeyValueStore>,
}

impl OfflineFlag {
    /// Creates the flag over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Returns the persisted value.
    ///
    /// # Errors
    ///
    /// Returns an error if the flag cannot be read.
    pub fn is_offline(&self) -> CoreResult<bool> {
        Ok(self.store.get_json(keys::OFFLINE)?.unwrap_or(false))
    }

    /// Persists a new value.
    ///
    /// # Errors
    ///
    /// Returns an error if the flag cannot be written.
    pub fn set_offline(&self, offline: bool) -> CoreResult<()> {
        self.store.set_json(keys::OFFLINE, &offline)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use possync_storage::InMemoryStore;

    #[test]
    fn unset_flag_reads_online() {
        let flag = OfflineFlag::new(Arc::new(InMemoryStore::new()));
        assert!(!flag.is_offline().unwrap());
    }

    #[test]
    fn flag_round_trips_through_store() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        OfflineFlag::new(Arc::clone(&store)).set_offline(true).unwrap();
        assert!(OfflineFlag::new(Arc::clone(&store)).is_offline().unwrap());

        OfflineFlag::new(Arc::clone(&store)).set_offline(false).unwrap();
        assert!(!OfflineFlag::new(store).is_offline().unwrap());
    }
}
