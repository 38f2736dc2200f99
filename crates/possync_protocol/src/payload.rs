//! Tagged unions over the entity kinds.
//!
//! [`EntityPayload`] carries one record, [`RecordSet`] a whole set of one
//! kind. Both serialize with an explicit `entity` tag, so a value can never
//! be read back as the wrong kind.

use crate::entity::{EntityKind, Expense, InventoryItem, Refund, Sale};
use crate::error::{ProtocolError, ProtocolResult};
use crate::merge::{merge_with_report, MergeReport};
use crate::record::Record;
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};

macro_rules! each_variant {
    ($ty:ident, $value:expr, $inner:ident => $body:expr) => {
        match $value {
            $ty::InventoryItem($inner) => $body,
            $ty::Expense($inner) => $body,
            $ty::Sale($inner) => $body,
            $ty::Refund($inner) => $body,
        }
    };
}

/// A single record of any kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", content = "record", rename_all = "snake_case")]
pub enum EntityPayload {
    /// An inventory item.
    InventoryItem(InventoryItem),
    /// An expense.
    Expense(Expense),
    /// A sale.
    Sale(Sale),
    /// A refund.
    Refund(Refund),
}

impl EntityPayload {
    /// Returns the kind of the carried record.
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityPayload::InventoryItem(_) => EntityKind::InventoryItem,
            EntityPayload::Expense(_) => EntityKind::Expense,
            EntityPayload::Sale(_) => EntityKind::Sale,
            EntityPayload::Refund(_) => EntityKind::Refund,
        }
    }

    /// Returns the id of the carried record.
    pub fn id(&self) -> &str {
        each_variant!(EntityPayload, self, record => record.id())
    }

    /// Returns the update instant of the carried record.
    pub fn updated_at(&self) -> Option<Timestamp> {
        each_variant!(EntityPayload, self, record => record.updated_at())
    }

    /// Stamps the carried record as updated at `at`.
    pub fn touch(&mut self, at: Timestamp) {
        each_variant!(EntityPayload, self, record => record.touch(at))
    }
}

impl From<InventoryItem> for EntityPayload {
    fn from(record: InventoryItem) -> Self {
        EntityPayload::InventoryItem(record)
    }
}

impl From<Expense> for EntityPayload {
    fn from(record: Expense) -> Self {
        EntityPayload::Expense(record)
    }
}

impl From<Sale> for EntityPayload {
    fn from(record: Sale) -> Self {
        EntityPayload::Sale(record)
    }
}

impl From<Refund> for EntityPayload {
    fn from(record: Refund) -> Self {
        EntityPayload::Refund(record)
    }
}

/// A whole record set of one kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", content = "records", rename_all = "snake_case")]
pub enum RecordSet {
    /// Inventory items.
    InventoryItem(Vec<InventoryItem>),
    /// Expenses.
    Expense(Vec<Expense>),
    /// Sales.
    Sale(Vec<Sale>),
    /// Refunds.
    Refund(Vec<Refund>),
}

impl RecordSet {
    /// Creates an empty set of the given kind.
    pub fn empty(kind: EntityKind) -> Self {
        match kind {
            EntityKind::InventoryItem => RecordSet::InventoryItem(Vec::new()),
            EntityKind::Expense => RecordSet::Expense(Vec::new()),
            EntityKind::Sale => RecordSet::Sale(Vec::new()),
            EntityKind::Refund => RecordSet::Refund(Vec::new()),
        }
    }

    /// Returns the kind of the records in this set.
    pub fn kind(&self) -> EntityKind {
        match self {
            RecordSet::InventoryItem(_) => EntityKind::InventoryItem,
            RecordSet::Expense(_) => EntityKind::Expense,
            RecordSet::Sale(_) => EntityKind::Sale,
            RecordSet::Refund(_) => EntityKind::Refund,
        }
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        each_variant!(RecordSet, self, records => records.len())
    }

    /// Returns true if the set holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the record ids in set order.
    pub fn ids(&self) -> Vec<&str> {
        each_variant!(RecordSet, self, records => records.iter().map(|r| r.id()).collect())
    }

    /// Returns true if a record with `id` is present.
    pub fn contains(&self, id: &str) -> bool {
        each_variant!(RecordSet, self, records => records.iter().any(|r| r.id() == id))
    }

    /// Returns a copy of the record with `id`, if present.
    pub fn get(&self, id: &str) -> Option<EntityPayload> {
        each_variant!(RecordSet, self, records => records
            .iter()
            .find(|r| r.id() == id)
            .cloned()
            .map(EntityPayload::from))
    }

    /// Returns every record as a payload, in set order.
    pub fn payloads(&self) -> Vec<EntityPayload> {
        each_variant!(RecordSet, self, records => records
            .iter()
            .cloned()
            .map(EntityPayload::from)
            .collect())
    }

    /// Inserts `payload`, replacing a record with the same id in place.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::KindMismatch`] if the payload kind differs.
    pub fn upsert(&mut self, payload: EntityPayload) -> ProtocolResult<()> {
        match (self, payload) {
            (RecordSet::InventoryItem(records), EntityPayload::InventoryItem(r)) => {
                upsert_record(records, r)
            }
            (RecordSet::Expense(records), EntityPayload::Expense(r)) => upsert_record(records, r),
            (RecordSet::Sale(records), EntityPayload::Sale(r)) => upsert_record(records, r),
            (RecordSet::Refund(records), EntityPayload::Refund(r)) => upsert_record(records, r),
            (set, payload) => {
                return Err(ProtocolError::KindMismatch {
                    expected: set.kind(),
                    found: payload.kind(),
                })
            }
        }
        Ok(())
    }

    /// Removes the record with `id`. Returns true if one was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        each_variant!(RecordSet, self, records => {
            let before = records.len();
            records.retain(|r| r.id() != id);
            records.len() != before
        })
    }

    /// Merges a local and a remote set of the same kind.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::KindMismatch`] if the kinds differ.
    pub fn merge(local: &RecordSet, remote: &RecordSet) -> ProtocolResult<(RecordSet, MergeReport)> {
        let merged = match (local, remote) {
            (RecordSet::InventoryItem(l), RecordSet::InventoryItem(r)) => {
                let outcome = merge_with_report(l, r);
                (RecordSet::InventoryItem(outcome.records), outcome.report)
            }
            (RecordSet::Expense(l), RecordSet::Expense(r)) => {
                let outcome = merge_with_report(l, r);
                (RecordSet::Expense(outcome.records), outcome.report)
            }
            (RecordSet::Sale(l), RecordSet::Sale(r)) => {
                let outcome = merge_with_report(l, r);
                (RecordSet::Sale(outcome.records), outcome.report)
            }
            (RecordSet::Refund(l), RecordSet::Refund(r)) => {
                let outcome = merge_with_report(l, r);
                (RecordSet::Refund(outcome.records), outcome.report)
            }
            (l, r) => {
                return Err(ProtocolError::KindMismatch {
                    expected: l.kind(),
                    found: r.kind(),
                })
            }
        };
        Ok(merged)
    }
}

fn upsert_record<R: Record>(records: &mut Vec<R>, record: R) {
    match records.iter_mut().find(|r| r.id() == record.id()) {
        Some(slot) => *slot = record,
        None => records.push(record),
    }
}
