//! Typed JSON access on top of any [`KeyValueStore`].

use crate::error::{StorageError, StorageResult};
use crate::store::KeyValueStore;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Typed access to a store whose values are JSON documents.
///
/// Implemented for every [`KeyValueStore`], including trait objects.
pub trait JsonStoreExt: KeyValueStore {
    /// Reads and decodes the JSON value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupted`] if the stored bytes do not decode
    /// as `T`, or any error from the underlying store.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.get(key)? {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StorageError::Corrupted {
                    key: key.to_string(),
                    message: e.to_string(),
                }),
        }
    }

    /// Encodes `value` as JSON and stores it under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the underlying write fails.
    fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StorageResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.set(key, &bytes)
    }
}

impl<S: KeyValueStore + ?Sized> JsonStoreExt for S {}
