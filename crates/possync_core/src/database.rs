//! The local mutation facade.

use crate::audit::AuditLog;
use crate::collections::RecordCollections;
use crate::config::DatabaseConfig;
use crate::error::{CoreError, CoreResult};
use crate::flags::OfflineFlag;
use crate::identity::Identity;
use crate::queue::ActionQueue;
use possync_protocol::{
    now, ActionOp, AuditLogEntry, EntityKind, EntityPayload, MergeReport, QueuedAction, RecordSet,
};
use possync_storage::KeyValueStore;
use std::sync::Arc;
use tracing::{debug, info};

/// A whole-record mutation with its audit metadata.
///
/// The action label and details default to a description derived from
/// the operation and the record ("Add Item", "Added item: Paracetamol").
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    /// Operation to apply.
    pub operation: ActionOp,
    /// The record written, or the record removed.
    pub payload: EntityPayload,
    /// Audit action label override.
    pub action: Option<String>,
    /// Audit details override.
    pub details: Option<String>,
    /// Whether the remote already confirmed this change.
    pub confirmed: bool,
}

impl Mutation {
    /// Creates a mutation with default audit metadata.
    pub fn new(operation: ActionOp, payload: impl Into<EntityPayload>) -> Self {
        Self {
            operation,
            payload: payload.into(),
            action: None,
            details: None,
            confirmed: false,
        }
    }

    /// Sets the audit action label.
    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Sets the audit details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Marks the change as already confirmed by the remote, so it is
    /// audited but not queued.
    #[must_use]
    pub fn confirmed(mut self) -> Self {
        self.confirmed = true;
        self
    }

    fn action_label(&self) -> String {
        self.action.clone().unwrap_or_else(|| {
            let verb = match self.operation {
                ActionOp::Create => "Add",
                ActionOp::Update => "Update",
                ActionOp::Delete => "Delete",
            };
            format!("{verb} {}", noun(self.payload.kind()))
        })
    }

    fn details_text(&self) -> String {
        self.details.clone().unwrap_or_else(|| {
            let verb = match self.operation {
                ActionOp::Create => "Added",
                ActionOp::Update => "Updated",
                ActionOp::Delete => "Deleted",
            };
            format!(
                "{verb} {}: {}",
                noun(self.payload.kind()).to_lowercase(),
                describe(&self.payload)
            )
        })
    }
}

fn noun(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::InventoryItem => "Item",
        EntityKind::Expense => "Expense",
        EntityKind::Sale => "Sale",
        EntityKind::Refund => "Refund",
    }
}

fn describe(payload: &EntityPayload) -> String {
    match payload {
        EntityPayload::InventoryItem(item) => item.name.clone(),
        EntityPayload::Expense(expense) => {
            format!("{}, {:.2}", expense.expense_type, expense.amount)
        }
        EntityPayload::Sale(sale) => format!("{} items, total {:.2}", sale.items.len(), sale.total),
        EntityPayload::Refund(refund) => {
            format!("sale {}, total {:.2}", refund.sale_id, refund.total)
        }
    }
}

/// The local database of one terminal.
///
/// Ties the record collections, the action queue, the audit log and the
/// offline flag to a single store. Every mutation:
///
/// 1. rewrites the kind's collection inside its critical section
/// 2. appends an audit entry
/// 3. enqueues a [`QueuedAction`] unless the mutation was confirmed
///
/// The sync merge step goes through [`LocalDatabase::merge_remote`],
/// which takes the same per-kind critical section, so a sale recorded
/// mid-cycle is never overwritten by a stale merge result.
pub struct LocalDatabase {
    store: Arc<dyn KeyValueStore>,
    collections: RecordCollections,
    queue: ActionQueue,
    audit: AuditLog,
    offline: OfflineFlag,
}

impl LocalDatabase {
    /// Opens the database over `store`.
    pub fn open(store: Arc<dyn KeyValueStore>, config: DatabaseConfig) -> Self {
        debug!(audit_capacity = config.audit_capacity, "opening local database");
        Self {
            collections: RecordCollections::new(Arc::clone(&store)),
            queue: ActionQueue::new(Arc::clone(&store)),
            audit: AuditLog::with_capacity(Arc::clone(&store), config.audit_capacity),
            offline: OfflineFlag::new(Arc::clone(&store)),
            store,
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Returns the action queue.
    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    /// Returns the audit log.
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Returns the offline flag.
    pub fn offline(&self) -> &OfflineFlag {
        &self.offline
    }

    /// Returns the record collections.
    pub fn collections(&self) -> &RecordCollections {
        &self.collections
    }

    /// Returns a copy of the current set for `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if the set cannot be read.
    pub fn snapshot(&self, kind: EntityKind) -> CoreResult<RecordSet> {
        self.collections.load(kind)
    }

    /// Adds a new record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateRecord`] if the id already exists.
    pub fn create(
        &self,
        payload: impl Into<EntityPayload>,
        actor: Option<&Identity>,
    ) -> CoreResult<EntityPayload> {
        self.apply(Mutation::new(ActionOp::Create, payload), actor)
    }

    /// Replaces an existing record, stamping its update time.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RecordNotFound`] if the id does not exist.
    pub fn update(
        &self,
        payload: impl Into<EntityPayload>,
        actor: Option<&Identity>,
    ) -> CoreResult<EntityPayload> {
        self.apply(Mutation::new(ActionOp::Update, payload), actor)
    }

    /// Removes the record `id` of `kind`, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RecordNotFound`] if the id does not exist.
    pub fn delete(
        &self,
        kind: EntityKind,
        id: &str,
        actor: Option<&Identity>,
    ) -> CoreResult<EntityPayload> {
        let existing = self
            .collections
            .load(kind)?
            .get(id)
            .ok_or_else(|| CoreError::RecordNotFound {
                kind,
                id: id.to_string(),
            })?;
        self.apply(Mutation::new(ActionOp::Delete, existing), actor)
    }

    /// Applies `mutation` and returns the record as written or removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the mutation does not fit the current
    /// collection, or if any write fails. The audit entry and the queued
    /// action are only written after the collection has been updated.
    pub fn apply(&self, mut mutation: Mutation, actor: Option<&Identity>) -> CoreResult<EntityPayload> {
        let kind = mutation.payload.kind();
        if mutation.operation == ActionOp::Update {
            mutation.payload.touch(now());
        }

        let operation = mutation.operation;
        let payload = mutation.payload.clone();
        let stored = self.collections.with_locked(kind, move |set| {
            let id = payload.id().to_string();
            match operation {
                ActionOp::Create => {
                    if set.contains(&id) {
                        return Err(CoreError::DuplicateRecord { kind, id });
                    }
                    set.upsert(payload.clone())?;
                    Ok(payload)
                }
                ActionOp::Update => {
                    if !set.contains(&id) {
                        return Err(CoreError::RecordNotFound { kind, id });
                    }
                    set.upsert(payload.clone())?;
                    Ok(payload)
                }
                ActionOp::Delete => {
                    let removed = set.get(&id).ok_or(CoreError::RecordNotFound {
                        kind,
                        id: id.clone(),
                    })?;
                    set.remove(&id);
                    Ok(removed)
                }
            }
        })?;

        self.audit.add(AuditLogEntry::new(
            actor.map(Identity::actor),
            mutation.action_label(),
            kind,
            stored.id(),
            mutation.details_text(),
        ))?;

        if !mutation.confirmed {
            self.queue
                .enqueue(QueuedAction::new(operation, stored.clone()))?;
        }

        info!(kind = %kind, id = stored.id(), op = %operation, "local mutation applied");
        Ok(stored)
    }

    /// Merges a pulled remote set into the local set of the same kind
    /// and persists the result, all inside the kind's critical section.
    ///
    /// # Errors
    ///
    /// Returns an error if the local set cannot be read or written.
    pub fn merge_remote(&self, remote: &RecordSet) -> CoreResult<MergeReport> {
        self.collections.with_locked(remote.kind(), |local| {
            let (merged, report) = RecordSet::merge(local, remote)?;
            *local = merged;
            Ok(report)
        })
    }
}
