//! Error types for the sync engine.

use possync_protocol::EntityKind;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The configuration gate failed.
    #[error("sync not configured: {0}")]
    Configuration(String),

    /// The remote could not be reached.
    #[error("connectivity lost: {0}")]
    Connectivity(String),

    /// The remote refused a specific call.
    #[error("remote rejected request: {message}")]
    RemoteRejected {
        /// Kind the call concerned, if any.
        kind: Option<EntityKind>,
        /// Remote message.
        message: String,
    },

    /// The remote schema for a kind does not match the local one.
    #[error("{kind} is not compatible with the remote schema: {reason}")]
    SchemaIncompatible {
        /// Affected kind.
        kind: EntityKind,
        /// Why the kind is skipped.
        reason: String,
    },

    /// A queued action failed to replay.
    #[error("queued action {action_id} failed: {message}")]
    QueueItemFailed {
        /// Failed action id.
        action_id: String,
        /// Failure description.
        message: String,
    },

    /// Sync was cancelled.
    #[error("sync cancelled")]
    Cancelled,

    /// Remote data could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// A remote call timed out.
    #[error("operation timed out")]
    Timeout,

    /// Local persistence failed.
    #[error("local database error: {0}")]
    Core(#[from] possync_core::CoreError),

    /// Invalid state transition.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

impl SyncError {
    /// Creates a connectivity error.
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::Connectivity(message.into())
    }

    /// Creates a rejection for a call concerning `kind`.
    pub fn rejected(kind: EntityKind, message: impl Into<String>) -> Self {
        Self::RemoteRejected {
            kind: Some(kind),
            message: message.into(),
        }
    }

    /// Returns true if this error aborts the running cycle.
    ///
    /// Everything else is absorbed by the step that hit it and recorded
    /// in the cycle report.
    pub fn is_cycle_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::Connectivity(_)
                | SyncError::Timeout
                | SyncError::Cancelled
                | SyncError::Core(_)
        )
    }
}

impl From<possync_protocol::ProtocolError> for SyncError {
    fn from(err: possync_protocol::ProtocolError) -> Self {
        Self::Core(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors() {
        assert!(SyncError::connectivity("wifi down").is_cycle_fatal());
        assert!(SyncError::Timeout.is_cycle_fatal());
        assert!(SyncError::Cancelled.is_cycle_fatal());
        assert!(!SyncError::rejected(EntityKind::Expense, "403").is_cycle_fatal());
        assert!(!SyncError::Codec("bad row".into()).is_cycle_fatal());
        assert!(!SyncError::QueueItemFailed {
            action_id: "a".into(),
            message: "conflict".into(),
        }
        .is_cycle_fatal());
    }

    #[test]
    fn error_display() {
        let err = SyncError::connectivity("no route to host");
        assert_eq!(err.to_string(), "connectivity lost: no route to host");

        let err = SyncError::SchemaIncompatible {
            kind: EntityKind::Sale,
            reason: "line items live in a separate table".into(),
        };
        assert!(err.to_string().starts_with("sale is not compatible"));
    }
}
