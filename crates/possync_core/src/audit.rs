//! Capped, append-only history of local mutations.

use crate::config::DEFAULT_AUDIT_CAPACITY;
use crate::error::CoreResult;
use crate::keys;
use parking_lot::Mutex;
use possync_protocol::{AuditLogEntry, AuditQuery};
use possync_storage::{JsonStoreExt, KeyValueStore};
use std::sync::Arc;

/// The audit log.
///
/// Entries are kept in insertion order. When an `add` pushes the log past
/// its capacity, the oldest entries are evicted before the log is
/// persisted. The log is local-only and independent of sync state.
pub struct AuditLog {
    store: Arc<dyn KeyValueStore>,
    capacity: usize,
    lock: Mutex<()>,
}

impl AuditLog {
    /// Creates an audit log over `store` with the default capacity.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_capacity(store, DEFAULT_AUDIT_CAPACITY)
    }

    /// Creates an audit log keeping at most `capacity` entries.
    pub fn with_capacity(store: Arc<dyn KeyValueStore>, capacity: usize) -> Self {
        Self {
            store,
            capacity: capacity.max(1),
            lock: Mutex::new(()),
        }
    }

    /// Returns the maximum number of retained entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends an entry, evicting the oldest ones beyond capacity.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read or written.
    pub fn add(&self, entry: AuditLogEntry) -> CoreResult<()> {
        let _guard = self.lock.lock();
        let mut entries = self.load()?;
        entries.push(entry);
        if entries.len() > self.capacity {
            let excess = entries.len() - self.capacity;
            entries.drain(..excess);
        }
        self.store.set_json(keys::AUDIT_LOG, &entries)?;
        Ok(())
    }

    /// Returns every entry, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    pub fn get_all(&self) -> CoreResult<Vec<AuditLogEntry>> {
        let _guard = self.lock.lock();
        self.load()
    }

    /// Returns every entry, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    pub fn recent(&self) -> CoreResult<Vec<AuditLogEntry>> {
        let mut entries = self.get_all()?;
        entries.reverse();
        Ok(entries)
    }

    /// Returns the entries matching `query`, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    pub fn query(&self, query: &AuditQuery) -> CoreResult<Vec<AuditLogEntry>> {
        Ok(self
            .recent()?
            .into_iter()
            .filter(|entry| query.matches(entry))
            .collect())
    }

    /// Returns the number of entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    pub fn len(&self) -> CoreResult<usize> {
        Ok(self.get_all()?.len())
    }

    /// Returns true if the log is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be written.
    pub fn clear(&self) -> CoreResult<()> {
        let _guard = self.lock.lock();
        self.store.remove(keys::AUDIT_LOG)?;
        Ok(())
    }

    fn load(&self) -> CoreResult<Vec<AuditLogEntry>> {
        Ok(self.store.get_json(keys::AUDIT_LOG)?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use possync_protocol::EntityKind;
    use possync_storage::InMemoryStore;

    fn entry(n: usize) -> AuditLogEntry {
        AuditLogEntry::new(
            Some(("u1", "Cashier")),
            "Add Sale",
            EntityKind::Sale,
            format!("sale-{n}"),
            format!("entry {n}"),
        )
    }

    fn log(capacity: usize) -> AuditLog {
        AuditLog::with_capacity(Arc::new(InMemoryStore::new()), capacity)
    }

    #[test]
    fn keeps_insertion_order() {
        let log = log(10);
        for n in 0..3 {
            log.add(entry(n)).unwrap();
        }
        let ids: Vec<_> = log.get_all().unwrap().into_iter().map(|e| e.entity_id).collect();
        assert_eq!(ids, vec!["sale-0", "sale-1", "sale-2"]);
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let log = AuditLog::new(Arc::new(InMemoryStore::new()));
        for n in 0..1005 {
            log.add(entry(n)).unwrap();
        }

        let entries = log.get_all().unwrap();
        assert_eq!(entries.len(), 1000);
        assert_eq!(entries[0].entity_id, "sale-5");
        assert_eq!(entries[999].entity_id, "sale-1004");
        for n in 0..5 {
            let id = format!("sale-{n}");
            assert!(entries.iter().all(|e| e.entity_id != id));
        }
    }

    #[test]
    fn recent_is_reversed() {
        let log = log(10);
        log.add(entry(0)).unwrap();
        log.add(entry(1)).unwrap();
        assert_eq!(log.recent().unwrap()[0].entity_id, "sale-1");
    }

    #[test]
    fn query_filters_entries() {
        let log = log(10);
        log.add(entry(0)).unwrap();
        log.add(AuditLogEntry::new(
            None,
            "Delete Expense",
            EntityKind::Expense,
            "exp-1",
            "Deleted expense: rent",
        ))
        .unwrap();

        let expenses = log
            .query(&AuditQuery::new().with_kind(EntityKind::Expense))
            .unwrap();
        assert_eq!(expenses.len(), 1);
        assert_eq!(expenses[0].actor_name, "System");

        let rent = log.query(&AuditQuery::new().with_text("RENT")).unwrap();
        assert_eq!(rent.len(), 1);
    }

    #[test]
    fn clear_empties_the_log() {
        let log = log(10);
        log.add(entry(0)).unwrap();
        log.clear().unwrap();
        assert!(log.is_empty().unwrap());
    }
}
