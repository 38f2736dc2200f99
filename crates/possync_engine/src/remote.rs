//! The Remote Client contract and an in-process remote.

use crate::error::{SyncError, SyncResult};
use parking_lot::{Mutex, RwLock};
use possync_protocol::{ActionOp, EntityKind, QueuedAction, RecordSet};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

/// Whether a kind can be pushed to the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compatibility {
    /// Local and remote shapes match.
    Compatible,
    /// The remote stores this kind differently; pushes are skipped.
    Incompatible {
        /// Why.
        reason: String,
    },
}

/// A record the remote refused during an upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordRejection {
    /// Record id.
    pub id: String,
    /// Remote message.
    pub message: String,
}

/// Result of an upsert that reached the remote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Records accepted.
    pub accepted: usize,
    /// Records refused.
    pub rejected: Vec<RecordRejection>,
}

/// Gateway to the canonical remote store.
///
/// Every call is scoped to an owner id. Calls are synchronous and may
/// block on I/O; the scheduler runs cycles on blocking threads.
///
/// Errors are classified by [`SyncError::is_cycle_fatal`]: connectivity
/// failures and timeouts abort the cycle, rejections are absorbed.
pub trait RemoteClient: Send + Sync {
    /// Fetches every record of `kind` owned by `owner`.
    fn pull(&self, kind: EntityKind, owner: &str) -> SyncResult<RecordSet>;

    /// Inserts or replaces `records` by id.
    fn upsert(&self, owner: &str, records: &RecordSet) -> SyncResult<UpsertOutcome>;

    /// Applies one queued action by id.
    fn replay(&self, owner: &str, action: &QueuedAction) -> SyncResult<()>;

    /// Reports whether `kind` can be pushed.
    fn compatibility(&self, _kind: EntityKind) -> Compatibility {
        Compatibility::Compatible
    }

    /// Checks if the remote is reachable.
    fn is_connected(&self) -> bool;
}

impl<R: RemoteClient + ?Sized> RemoteClient for Arc<R> {
    fn pull(&self, kind: EntityKind, owner: &str) -> SyncResult<RecordSet> {
        (**self).pull(kind, owner)
    }

    fn upsert(&self, owner: &str, records: &RecordSet) -> SyncResult<UpsertOutcome> {
        (**self).upsert(owner, records)
    }

    fn replay(&self, owner: &str, action: &QueuedAction) -> SyncResult<()> {
        (**self).replay(owner, action)
    }

    fn compatibility(&self, kind: EntityKind) -> Compatibility {
        (**self).compatibility(kind)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

#[derive(Debug, Default)]
struct FailurePlan {
    reject_pulls: HashSet<EntityKind>,
    reject_upserts: HashSet<EntityKind>,
    reject_records: HashSet<String>,
    disconnect_on_pull: Option<EntityKind>,
    held_pull: Option<(EntityKind, Arc<Barrier>)>,
}

/// An in-process remote store.
///
/// Keeps one record set per (owner, kind) and supports failure injection
/// for exercising degraded cycles. Replays are idempotent: create and
/// update write by id, delete of a missing id succeeds.
#[derive(Debug)]
pub struct MemoryRemote {
    connected: AtomicBool,
    tables: RwLock<HashMap<(String, EntityKind), RecordSet>>,
    incompatible: RwLock<HashMap<EntityKind, String>>,
    failures: Mutex<FailurePlan>,
    replayed: Mutex<Vec<String>>,
    pulls: AtomicUsize,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    /// Creates an empty, connected remote.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            tables: RwLock::new(HashMap::new()),
            incompatible: RwLock::new(HashMap::new()),
            failures: Mutex::new(FailurePlan::default()),
            replayed: Mutex::new(Vec::new()),
            pulls: AtomicUsize::new(0),
        }
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Replaces the records `owner` has for the set's kind.
    pub fn seed(&self, owner: &str, records: RecordSet) {
        self.tables
            .write()
            .insert((owner.to_string(), records.kind()), records);
    }

    /// Returns the records `owner` has for `kind`.
    pub fn records(&self, owner: &str, kind: EntityKind) -> RecordSet {
        self.tables
            .read()
            .get(&(owner.to_string(), kind))
            .cloned()
            .unwrap_or_else(|| RecordSet::empty(kind))
    }

    /// Marks `kind` as incompatible for push.
    pub fn mark_incompatible(&self, kind: EntityKind, reason: impl Into<String>) {
        self.incompatible.write().insert(kind, reason.into());
    }

    /// Makes pulls of `kind` fail with a rejection.
    pub fn reject_pulls_of(&self, kind: EntityKind) {
        self.failures.lock().reject_pulls.insert(kind);
    }

    /// Makes upserts of `kind` fail as a whole.
    pub fn reject_upserts_of(&self, kind: EntityKind) {
        self.failures.lock().reject_upserts.insert(kind);
    }

    /// Makes the remote refuse the record `id` in upserts and replays.
    pub fn reject_record(&self, id: impl Into<String>) {
        self.failures.lock().reject_records.insert(id.into());
    }

    /// Drops the connection when `kind` is pulled.
    pub fn disconnect_on_pull_of(&self, kind: EntityKind) {
        self.failures.lock().disconnect_on_pull = Some(kind);
    }

    /// Makes the next pull of `kind` wait on `barrier` before answering.
    pub fn hold_next_pull_of(&self, kind: EntityKind, barrier: Arc<Barrier>) {
        self.failures.lock().held_pull = Some((kind, barrier));
    }

    /// Removes every injected failure.
    pub fn clear_failures(&self) {
        *self.failures.lock() = FailurePlan::default();
    }

    /// Returns the ids of actions replayed successfully, in order.
    pub fn replayed(&self) -> Vec<String> {
        self.replayed.lock().clone()
    }

    /// Returns the number of pull calls received.
    pub fn pull_count(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    fn ensure_connected(&self) -> SyncResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(SyncError::connectivity("remote unreachable"))
        }
    }
}

impl RemoteClient for MemoryRemote {
    fn pull(&self, kind: EntityKind, owner: &str) -> SyncResult<RecordSet> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        let held = {
            let mut failures = self.failures.lock();
            match &failures.held_pull {
                Some((held_kind, _)) if *held_kind == kind => failures.held_pull.take(),
                _ => None,
            }
        };
        if let Some((_, barrier)) = held {
            barrier.wait();
        }
        self.ensure_connected()?;
        {
            let failures = self.failures.lock();
            if failures.disconnect_on_pull == Some(kind) {
                self.set_connected(false);
                return Err(SyncError::connectivity(format!("connection dropped pulling {kind}")));
            }
            if failures.reject_pulls.contains(&kind) {
                return Err(SyncError::rejected(kind, "permission denied"));
            }
        }
        Ok(self.records(owner, kind))
    }

    fn upsert(&self, owner: &str, records: &RecordSet) -> SyncResult<UpsertOutcome> {
        self.ensure_connected()?;
        let kind = records.kind();
        let failures = self.failures.lock();
        if failures.reject_upserts.contains(&kind) {
            return Err(SyncError::rejected(kind, "upsert refused"));
        }

        let mut tables = self.tables.write();
        let table = tables
            .entry((owner.to_string(), kind))
            .or_insert_with(|| RecordSet::empty(kind));
        let mut outcome = UpsertOutcome::default();
        for payload in records.payloads() {
            if failures.reject_records.contains(payload.id()) {
                outcome.rejected.push(RecordRejection {
                    id: payload.id().to_string(),
                    message: "violates check constraint".into(),
                });
                continue;
            }
            table.upsert(payload)?;
            outcome.accepted += 1;
        }
        Ok(outcome)
    }

    fn replay(&self, owner: &str, action: &QueuedAction) -> SyncResult<()> {
        self.ensure_connected()?;
        let kind = action.kind();
        if self.failures.lock().reject_records.contains(action.record_id()) {
            return Err(SyncError::QueueItemFailed {
                action_id: action.id.clone(),
                message: format!("remote refused {} of {kind} {}", action.operation, action.record_id()),
            });
        }

        let mut tables = self.tables.write();
        let table = tables
            .entry((owner.to_string(), kind))
            .or_insert_with(|| RecordSet::empty(kind));
        match action.operation {
            ActionOp::Create | ActionOp::Update => table.upsert(action.payload.clone())?,
            ActionOp::Delete => {
                table.remove(action.record_id());
            }
        }
        self.replayed.lock().push(action.id.clone());
        Ok(())
    }

    fn compatibility(&self, kind: EntityKind) -> Compatibility {
        match self.incompatible.read().get(&kind) {
            Some(reason) => Compatibility::Incompatible {
                reason: reason.clone(),
            },
            None => Compatibility::Compatible,
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
