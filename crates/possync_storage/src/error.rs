//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The key is empty or contains characters the store cannot hold.
    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    /// The stored value for a key is unreadable.
    #[error("value for key {key:?} is corrupted: {message}")]
    Corrupted {
        /// The affected key.
        key: String,
        /// Description of the corruption.
        message: String,
    },
}
