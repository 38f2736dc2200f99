//! Whole record sets, one per entity kind.

use crate::error::{CoreError, CoreResult};
use crate::keys;
use parking_lot::Mutex;
use possync_protocol::{EntityKind, RecordSet};
use possync_storage::{JsonStoreExt, KeyValueStore};
use std::sync::Arc;

/// Per-kind record collections.
///
/// Each kind is stored as one [`RecordSet`] under [`keys::records`].
/// Every read-modify-write runs inside that kind's critical section,
/// which is shared by local mutations and the sync merge step. Plain
/// reads take the same lock so they never observe a half-applied
/// rewrite sequence.
pub struct RecordCollections {
    store: Arc<dyn KeyValueStore>,
    locks: [Mutex<()>; 4],
}

impl RecordCollections {
    /// Creates the collections over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            locks: Default::default(),
        }
    }

    /// Returns a copy of the set for `kind`, empty if none is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the set cannot be read or belongs to
    /// another kind.
    pub fn load(&self, kind: EntityKind) -> CoreResult<RecordSet> {
        let _guard = self.lock_for(kind).lock();
        self.read(kind)
    }

    /// Replaces the stored set for the set's kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the set cannot be written.
    pub fn save(&self, set: &RecordSet) -> CoreResult<()> {
        let _guard = self.lock_for(set.kind()).lock();
        self.write(set)
    }

    /// Runs `f` on the set for `kind` inside its critical section and
    /// persists the set if `f` succeeds.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`, or a storage error. Nothing is written
    /// when `f` fails.
    pub fn with_locked<T>(
        &self,
        kind: EntityKind,
        f: impl FnOnce(&mut RecordSet) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let _guard = self.lock_for(kind).lock();
        let mut set = self.read(kind)?;
        let value = f(&mut set)?;
        self.write(&set)?;
        Ok(value)
    }

    fn lock_for(&self, kind: EntityKind) -> &Mutex<()> {
        let slot = match kind {
            EntityKind::InventoryItem => 0,
            EntityKind::Expense => 1,
            EntityKind::Sale => 2,
            EntityKind::Refund => 3,
        };
        &self.locks[slot]
    }

    fn read(&self, kind: EntityKind) -> CoreResult<RecordSet> {
        match self.store.get_json::<RecordSet>(&keys::records(kind))? {
            None => Ok(RecordSet::empty(kind)),
            Some(set) if set.kind() == kind => Ok(set),
            Some(set) => Err(CoreError::CollectionMismatch {
                expected: kind,
                found: set.kind(),
            }),
        }
    }

    fn write(&self, set: &RecordSet) -> CoreResult<()> {
        self.store.set_json(&keys::records(set.kind()), set)?;
        Ok(())
    }
}
