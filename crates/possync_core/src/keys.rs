//! Storage keys used by the local database.

use possync_protocol::EntityKind;

/// Pending queued actions.
pub const QUEUE: &str = "pos.queue";

/// Audit log entries.
pub const AUDIT_LOG: &str = "pos.audit_log";

/// The persisted offline flag.
pub const OFFLINE: &str = "pos.offline";

/// The signed-in user.
pub const CURRENT_USER: &str = "pos.current_user";

/// Returns the key holding the record set of `kind`.
pub fn records(kind: EntityKind) -> String {
    format!("pos.records.{}", kind.as_str())
}
