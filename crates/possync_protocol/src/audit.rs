//! Entries of the local mutation history.

use crate::entity::EntityKind;
use crate::timestamp::{now, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Actor id recorded when no user is signed in.
pub const SYSTEM_ACTOR_ID: &str = "unknown";

/// Actor name recorded when no user is signed in.
pub const SYSTEM_ACTOR_NAME: &str = "System";

/// One immutable entry in the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Unique entry id.
    pub id: String,
    /// Id of the acting user.
    pub actor_id: String,
    /// Display name of the acting user.
    pub actor_name: String,
    /// Action label, e.g. "Add Item".
    pub action: String,
    /// Kind of the affected entity.
    pub entity_kind: EntityKind,
    /// Id of the affected entity.
    pub entity_id: String,
    /// Free-text details.
    pub details: String,
    /// When the mutation happened.
    pub timestamp: Timestamp,
}

impl AuditLogEntry {
    /// Creates an entry stamped now.
    ///
    /// A missing actor is recorded as [`SYSTEM_ACTOR_ID`] / [`SYSTEM_ACTOR_NAME`].
    pub fn new(
        actor: Option<(&str, &str)>,
        action: impl Into<String>,
        entity_kind: EntityKind,
        entity_id: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        let (actor_id, actor_name) = actor.unwrap_or((SYSTEM_ACTOR_ID, SYSTEM_ACTOR_NAME));
        Self {
            id: Uuid::new_v4().to_string(),
            actor_id: actor_id.to_string(),
            actor_name: actor_name.to_string(),
            action: action.into(),
            entity_kind,
            entity_id: entity_id.into(),
            details: details.into(),
            timestamp: now(),
        }
    }
}

/// A filter over audit entries.
///
/// An empty query matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditQuery {
    /// Only entries for this kind.
    pub entity_kind: Option<EntityKind>,
    /// Case-insensitive text matched against actor name, action and details.
    pub text: Option<String>,
}

impl AuditQuery {
    /// Creates an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the query to one entity kind.
    pub fn with_kind(mut self, kind: EntityKind) -> Self {
        self.entity_kind = Some(kind);
        self
    }

    /// Restricts the query to entries containing `text`.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Returns true if `entry` satisfies the query.
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        if self.entity_kind.is_some_and(|kind| kind != entry.entity_kind) {
            return false;
        }
        match self.text.as_deref().map(str::to_lowercase) {
            None => true,
            Some(needle) if needle.is_empty() => true,
            Some(needle) => [&entry.actor_name, &entry.action, &entry.details]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle)),
        }
    }
}
