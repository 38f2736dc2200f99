//! Error types for the protocol crate.

use crate::entity::EntityKind;
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while building or combining protocol values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Two values that must share an entity kind do not.
    #[error("entity kind mismatch: expected {expected}, found {found}")]
    KindMismatch {
        /// The kind the operation was working on.
        expected: EntityKind,
        /// The kind that was supplied.
        found: EntityKind,
    },

    /// A timestamp string is not a valid RFC 3339 instant.
    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),

    /// An entity kind name is not recognized.
    #[error("unknown entity kind {0:?}")]
    UnknownEntityKind(String),
}
