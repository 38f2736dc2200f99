//! Durable FIFO of mutations pending remote confirmation.

use crate::error::CoreResult;
use crate::keys;
use parking_lot::Mutex;
use possync_protocol::QueuedAction;
use possync_storage::{JsonStoreExt, KeyValueStore};
use std::sync::Arc;
use tracing::debug;

/// The action queue.
///
/// Actions are stored as one JSON array under [`keys::QUEUE`], in
/// insertion order. Every mutation of the queue is a whole-value rewrite
/// performed under an in-process lock, so concurrent `enqueue` and
/// `remove` calls never lose each other's writes.
///
/// # Invariants
///
/// - `list_all` returns actions in enqueue order
/// - No duplicate suppression: callers avoid redundant actions
/// - `remove` is by id and idempotent
/// - An action stays queued until a successful replay removes it
pub struct ActionQueue {
    store: Arc<dyn KeyValueStore>,
    lock: Mutex<()>,
}

impl ActionQueue {
    /// Creates a queue over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// Appends an action.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read or written.
    pub fn enqueue(&self, action: QueuedAction) -> CoreResult<()> {
        let _guard = self.lock.lock();
        let mut actions = self.load()?;
        debug!(action_id = %action.id, kind = %action.kind(), op = %action.operation, "enqueue");
        actions.push(action);
        self.store.set_json(keys::QUEUE, &actions)?;
        Ok(())
    }

    /// Removes the action with `id`. Returns true if one was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read or written.
    pub fn remove(&self, id: &str) -> CoreResult<bool> {
        let _guard = self.lock.lock();
        let mut actions = self.load()?;
        let before = actions.len();
        actions.retain(|a| a.id != id);
        if actions.len() == before {
            return Ok(false);
        }
        self.store.set_json(keys::QUEUE, &actions)?;
        Ok(true)
    }

    /// Returns every pending action in enqueue order.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read.
    pub fn list_all(&self) -> CoreResult<Vec<QueuedAction>> {
        let _guard = self.lock.lock();
        self.load()
    }

    /// Returns the number of pending actions.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read.
    pub fn len(&self) -> CoreResult<usize> {
        Ok(self.list_all()?.len())
    }

    /// Returns true if no action is pending.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Removes every action.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be written.
    pub fn clear(&self) -> CoreResult<()> {
        let _guard = self.lock.lock();
        self.store.set_json(keys::QUEUE, &Vec::<QueuedAction>::new())?;
        Ok(())
    }

    fn load(&self) -> CoreResult<Vec<QueuedAction>> {
        Ok(self.store.get_json(keys::QUEUE)?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use possync_protocol::{Expense, QueuedAction};
    use possync_storage::InMemoryStore;

    fn action(id: &str) -> QueuedAction {
        let mut action = QueuedAction::create(Expense {
            id: format!("exp-{id}"),
            date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            expense_type: "misc".into(),
            amount: 1.0,
            note: String::new(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        });
        action.id = id.to_string();
        action
    }

    fn queue() -> ActionQueue {
        ActionQueue::new(Arc::new(InMemoryStore::new()))
    }

    fn ids(queue: &ActionQueue) -> Vec<String> {
        queue.list_all().unwrap().into_iter().map(|a| a.id).collect()
    }

    #[test]
    fn starts_empty() {
        let queue = queue();
        assert!(queue.is_empty().unwrap());
        assert!(queue.list_all().unwrap().is_empty());
    }

    #[test]
    fn preserves_insertion_order() {
        let queue = queue();
        for id in ["A", "B", "C"] {
            queue.enqueue(action(id)).unwrap();
        }
        assert_eq!(ids(&queue), vec!["A", "B", "C"]);
    }

    #[test]
    fn does_not_suppress_duplicates() {
        let queue = queue();
        queue.enqueue(action("A")).unwrap();
        queue.enqueue(action("A")).unwrap();
        assert_eq!(queue.len().unwrap(), 2);
    }

    #[test]
    fn remove_is_by_id_and_idempotent() {
        let queue = queue();
        for id in ["A", "B", "C"] {
            queue.enqueue(action(id)).unwrap();
        }
        assert!(queue.remove("B").unwrap());
        assert!(!queue.remove("B").unwrap());
        assert!(!queue.remove("missing").unwrap());
        assert_eq!(ids(&queue), vec!["A", "C"]);
    }

    #[test]
    fn clear_empties_the_queue() {
        let queue = queue();
        queue.enqueue(action("A")).unwrap();
        queue.clear().unwrap();
        assert!(queue.is_empty().unwrap());
    }

    #[test]
    fn queue_survives_reopen() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        ActionQueue::new(Arc::clone(&store)).enqueue(action("A")).unwrap();

        let reopened = ActionQueue::new(store);
        assert_eq!(ids(&reopened), vec!["A"]);
    }
}
