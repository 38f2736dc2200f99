//! Error types for local persistence.

use possync_protocol::EntityKind;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in local persistence.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] possync_storage::StorageError),

    /// Protocol value error.
    #[error("protocol error: {0}")]
    Protocol(#[from] possync_protocol::ProtocolError),

    /// A mutation targeted a record that does not exist.
    #[error("{kind} {id:?} not found")]
    RecordNotFound {
        /// Kind searched.
        kind: EntityKind,
        /// Missing id.
        id: String,
    },

    /// A create used an id that already exists.
    #[error("{kind} {id:?} already exists")]
    DuplicateRecord {
        /// Kind written.
        kind: EntityKind,
        /// Conflicting id.
        id: String,
    },

    /// A stored value belongs to a different kind than its key says.
    #[error("collection for {expected} holds {found} records")]
    CollectionMismatch {
        /// Kind implied by the storage key.
        expected: EntityKind,
        /// Kind found in the stored value.
        found: EntityKind,
    },
}
