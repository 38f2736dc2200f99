//! Mutations awaiting remote confirmation.

use crate::entity::EntityKind;
use crate::payload::EntityPayload;
use crate::timestamp::{now, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The operation a queued action replays against the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOp {
    /// Insert a new record.
    Create,
    /// Overwrite an existing record by id.
    Update,
    /// Delete a record by id.
    Delete,
}

impl ActionOp {
    /// Returns the lowercase name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionOp::Create => "create",
            ActionOp::Update => "update",
            ActionOp::Delete => "delete",
        }
    }
}

impl fmt::Display for ActionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mutation recorded locally and not yet confirmed by the remote.
///
/// The entity kind is carried by the payload's tag, so an action can
/// never claim one kind while holding a record of another.
///
/// # Fields
///
/// - `id`: Unique action identifier, used for idempotent removal
/// - `operation`: Create, Update or Delete
/// - `payload`: The record as it was at mutation time
/// - `enqueued_at`: When the action was queued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAction {
    /// Unique action id.
    pub id: String,
    /// Operation to replay.
    pub operation: ActionOp,
    /// The affected record.
    pub payload: EntityPayload,
    /// Enqueue instant.
    pub enqueued_at: Timestamp,
}

impl QueuedAction {
    /// Creates an action with a fresh id, enqueued now.
    pub fn new(operation: ActionOp, payload: impl Into<EntityPayload>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            operation,
            payload: payload.into(),
            enqueued_at: now(),
        }
    }

    /// Creates a `Create` action.
    pub fn create(payload: impl Into<EntityPayload>) -> Self {
        Self::new(ActionOp::Create, payload)
    }

    /// Creates an `Update` action.
    pub fn update(payload: impl Into<EntityPayload>) -> Self {
        Self::new(ActionOp::Update, payload)
    }

    /// Creates a `Delete` action.
    pub fn delete(payload: impl Into<EntityPayload>) -> Self {
        Self::new(ActionOp::Delete, payload)
    }

    /// Returns the entity kind of the affected record.
    pub fn kind(&self) -> EntityKind {
        self.payload.kind()
    }

    /// Returns the id of the affected record.
    pub fn record_id(&self) -> &str {
        self.payload.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Refund;
    use crate::timestamp::parse_timestamp;

    fn refund() -> Refund {
        Refund {
            id: "r1".into(),
            sale_id: "s1".into(),
            items: Vec::new(),
            total: 4.0,
            reason: "damaged".into(),
            created_at: parse_timestamp("2024-04-01T10:00:00Z").unwrap(),
        }
    }

    #[test]
    fn action_ids_are_unique() {
        let a = QueuedAction::create(refund());
        let b = QueuedAction::create(refund());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn kind_and_record_id_come_from_payload() {
        let action = QueuedAction::delete(refund());
        assert_eq!(action.operation, ActionOp::Delete);
        assert_eq!(action.kind(), EntityKind::Refund);
        assert_eq!(action.record_id(), "r1");
    }

    #[test]
    fn action_serializes_with_tagged_payload() {
        let action = QueuedAction::update(refund());
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["operation"], "update");
        assert_eq!(json["payload"]["entity"], "refund");

        let back: QueuedAction = serde_json::from_value(json).unwrap();
        assert_eq!(back, action);
    }
}
