//! Sync engine state machine.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::gate::{ConfigGate, GateDecision};
use crate::remote::{Compatibility, RemoteClient};
use crate::report::{PushOutcome, QueueFailure, SkipReason, SyncCycleReport, SyncOutcome};
use parking_lot::RwLock;
use possync_core::{Identity, LocalDatabase};
use possync_protocol::{now, ActionOp, EntityKind, QueuedAction, RecordSet, Timestamp};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Nothing has run yet.
    Idle,
    /// Connected and configured; waiting for a trigger.
    Online,
    /// Connectivity is down; no cycle is attempted.
    Offline,
    /// A cycle is running.
    Syncing,
    /// The last cycle aborted.
    Error,
}

impl SyncState {
    /// Returns true if a cycle is running.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Syncing)
    }

    /// Returns true if the engine can start a new cycle.
    pub fn can_start_sync(&self) -> bool {
        matches!(self, SyncState::Idle | SyncState::Online | SyncState::Error)
    }

    /// Returns true if moving to `next` is a legal transition.
    pub fn can_transition_to(&self, next: SyncState) -> bool {
        use SyncState::*;
        matches!(
            (self, next),
            (Idle, Online)
                | (Online, Syncing)
                | (Syncing, Online)
                | (Syncing, Error)
                | (Error, Online)
                | (Offline, Idle)
                | (Idle | Online | Syncing | Error, Offline)
        )
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncState::Idle => "idle",
            SyncState::Online => "online",
            SyncState::Offline => "offline",
            SyncState::Syncing => "syncing",
            SyncState::Error => "error",
        })
    }
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Cycles that ran to the end.
    pub cycles_completed: u64,
    /// Cycles that aborted.
    pub cycles_failed: u64,
    /// Requests that did not start a cycle.
    pub cycles_skipped: u64,
    /// Records pulled by completed cycles.
    pub records_pulled: u64,
    /// Records accepted by upserts in completed cycles.
    pub records_pushed: u64,
    /// Queued actions replayed and removed.
    pub actions_replayed: u64,
    /// End of the last completed cycle.
    pub last_sync_time: Option<Timestamp>,
    /// Error of the last aborted cycle, cleared by the next completed one.
    pub last_error: Option<String>,
}

/// A point-in-time view of the sync state pair plus queue depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    /// Engine state.
    pub state: SyncState,
    /// The persisted `offline` flag.
    pub offline: bool,
    /// Whether the gate currently passes.
    pub configured: bool,
    /// Actions waiting in the queue.
    pub pending_actions: usize,
    /// Whether the remote answered its last call.
    pub remote_reachable: bool,
}

/// Clears the in-flight flag when a cycle ends, however it ends.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The sync engine reconciles one terminal's local database with the
/// remote store.
///
/// Calls to [`SyncEngine::sync`] are synchronous and single-flight: a
/// call made while another cycle is running returns immediately with
/// [`SkipReason::CycleInFlight`]. Connectivity is pushed in from outside
/// with [`SyncEngine::set_connectivity`]; losing it cancels the running
/// cycle at its next step boundary.
pub struct SyncEngine<R: RemoteClient> {
    config: SyncConfig,
    remote: R,
    db: Arc<LocalDatabase>,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    last_report: RwLock<Option<SyncCycleReport>>,
    connected: AtomicBool,
    in_flight: AtomicBool,
    cancelled: AtomicBool,
}

impl<R: RemoteClient> SyncEngine<R> {
    /// Creates a new sync engine.
    pub fn new(config: SyncConfig, remote: R, db: Arc<LocalDatabase>) -> Self {
        Self {
            config,
            remote,
            db,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            last_report: RwLock::new(None),
            connected: AtomicBool::new(true),
            in_flight: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Gets the remote client.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Gets the local database.
    pub fn database(&self) -> &Arc<LocalDatabase> {
        &self.db
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Gets the report of the last cycle that ran, completed or not.
    pub fn last_report(&self) -> Option<SyncCycleReport> {
        self.last_report.read().clone()
    }

    /// Returns true if a cycle is running.
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Returns the current status, evaluating the gate for `identity`.
    ///
    /// # Errors
    ///
    /// Returns an error if the local flags or queue cannot be read.
    pub fn status(&self, identity: Option<&Identity>) -> SyncResult<SyncStatus> {
        Ok(SyncStatus {
            state: self.state(),
            offline: self.db.offline().is_offline()?,
            configured: ConfigGate::evaluate(&self.config, identity).is_proceed(),
            pending_actions: self.db.queue().len()?,
            remote_reachable: self.remote.is_connected(),
        })
    }

    /// Cancels the running cycle at its next step boundary.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Checks if sync was cancelled.
    fn check_cancelled(&self) -> SyncResult<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Records a connectivity change.
    ///
    /// Going offline moves the engine to `Offline`, persists
    /// `offline=true` and cancels the running cycle. Coming back moves
    /// `Offline` to `Idle`, from where the next cycle re-evaluates the
    /// gate.
    ///
    /// # Errors
    ///
    /// Returns an error if the offline flag cannot be written.
    pub fn set_connectivity(&self, online: bool) -> SyncResult<()> {
        if self.connected.swap(online, Ordering::SeqCst) == online {
            return Ok(());
        }

        if online {
            let mut state = self.state.write();
            if *state == SyncState::Offline {
                *state = SyncState::Idle;
            }
            info!("connectivity restored");
            Ok(())
        } else {
            {
                let mut state = self.state.write();
                *state = SyncState::Offline;
                self.cancel();
            }
            warn!("connectivity lost");
            self.db.offline().set_offline(true)?;
            Ok(())
        }
    }

    /// Runs one sync cycle scoped to `identity`.
    ///
    /// Returns `Ok(SyncOutcome::Skipped)` when the cycle is a no-op:
    /// offline, already running, no identity, or the gate failed.
    ///
    /// # Errors
    ///
    /// Returns the error that aborted the cycle. The engine is then in
    /// `Error` (or `Offline`), `offline=true` is persisted, and whatever
    /// was merged before the abort stays persisted.
    pub fn sync(&self, identity: Option<&Identity>) -> SyncResult<SyncOutcome> {
        if !self.connected.load(Ordering::SeqCst) {
            return Ok(self.skip(SkipReason::Offline));
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(self.skip(SkipReason::CycleInFlight));
        }
        let _flight = FlightGuard(&self.in_flight);

        let identity = match ConfigGate::evaluate(&self.config, identity) {
            GateDecision::Proceed(identity) => identity,
            GateDecision::Skip(reason) => return Ok(self.skip(reason)),
        };

        {
            let mut state = self.state.write();
            if *state == SyncState::Offline {
                drop(state);
                return Ok(self.skip(SkipReason::Offline));
            }
            if matches!(*state, SyncState::Idle | SyncState::Error) {
                transition(&mut *state, SyncState::Online)?;
            }
            transition(&mut *state, SyncState::Syncing)?;
            self.cancelled.store(false, Ordering::SeqCst);
        }

        let started = Instant::now();
        let mut report =
            SyncCycleReport::new(&identity.user_id, now(), &self.config.entity_kinds);
        info!(owner = %identity.user_id, "sync cycle started");

        let result = self
            .run_cycle(&identity.user_id, &mut report)
            .and_then(|()| self.db.offline().set_offline(false).map_err(SyncError::from));
        report.duration = started.elapsed();

        match result {
            Ok(()) => {
                self.finish(SyncState::Online);
                {
                    let mut stats = self.stats.write();
                    stats.cycles_completed += 1;
                    stats.records_pulled += report.records_pulled() as u64;
                    stats.records_pushed += report.records_pushed() as u64;
                    stats.actions_replayed += report.drain.replayed.len() as u64;
                    stats.last_sync_time = Some(now());
                    stats.last_error = None;
                }
                info!(
                    pulled = report.records_pulled(),
                    pushed = report.records_pushed(),
                    replayed = report.drain.replayed.len(),
                    retained = report.drain.failed.len() + report.drain.deferred.len(),
                    elapsed_ms = report.duration.as_millis() as u64,
                    "sync cycle completed"
                );
                *self.last_report.write() = Some(report.clone());
                Ok(SyncOutcome::Completed(report))
            }
            Err(e) => {
                warn!(error = %e, "sync cycle aborted");
                report.error = Some(e.to_string());
                self.finish(SyncState::Error);
                if let Err(flag_err) = self.db.offline().set_offline(true) {
                    warn!(error = %flag_err, "could not persist offline flag");
                }
                {
                    let mut stats = self.stats.write();
                    stats.cycles_failed += 1;
                    stats.last_error = Some(e.to_string());
                }
                *self.last_report.write() = Some(report);
                Err(e)
            }
        }
    }

    fn skip(&self, reason: SkipReason) -> SyncOutcome {
        debug!(%reason, "sync skipped");
        self.stats.write().cycles_skipped += 1;
        SyncOutcome::Skipped(reason)
    }

    /// Leaves `Syncing`, unless connectivity was lost meanwhile.
    fn finish(&self, target: SyncState) {
        let mut state = self.state.write();
        if *state == SyncState::Offline || !self.connected.load(Ordering::SeqCst) {
            *state = SyncState::Offline;
        } else {
            *state = target;
        }
    }

    fn run_cycle(&self, owner: &str, report: &mut SyncCycleReport) -> SyncResult<()> {
        self.check_cancelled()?;
        let mut pulled = self.pull_all(owner, report)?;

        self.check_cancelled()?;
        self.withhold_pending_deletes(&mut pulled)?;
        let mut merged_kinds = Vec::with_capacity(pulled.len());
        for set in &pulled {
            let merge = self.db.merge_remote(set)?;
            debug!(
                kind = %set.kind(),
                remote_kept = merge.remote_kept,
                local_applied = merge.local_applied,
                local_only = merge.local_only,
                remote_only = merge.remote_only,
                "merged and persisted"
            );
            if let Some(entry) = report.kind_mut(set.kind()) {
                entry.merge = Some(merge);
            }
            merged_kinds.push(set.kind());
        }

        self.push_all(owner, &merged_kinds, report)?;
        self.drain_queue(owner, report)
    }

    /// Pulls every configured kind concurrently.
    ///
    /// Nothing is merged until every pull has returned, so a fatal error
    /// in any pull leaves the local store untouched.
    fn pull_all(&self, owner: &str, report: &mut SyncCycleReport) -> SyncResult<Vec<RecordSet>> {
        let remote = &self.remote;
        let results: Vec<(EntityKind, SyncResult<RecordSet>)> = std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .config
                .entity_kinds
                .iter()
                .map(|&kind| (kind, scope.spawn(move || remote.pull(kind, owner))))
                .collect();
            handles
                .into_iter()
                .map(|(kind, handle)| {
                    let result = handle
                        .join()
                        .unwrap_or_else(|_| Err(SyncError::rejected(kind, "pull panicked")));
                    (kind, result)
                })
                .collect()
        });

        let mut fatal = None;
        let mut sets = Vec::with_capacity(results.len());
        for (kind, result) in results {
            let result = result.and_then(|set| {
                if set.kind() == kind {
                    Ok(set)
                } else {
                    Err(SyncError::Codec(format!("pull of {kind} returned {}", set.kind())))
                }
            });
            let Some(entry) = report.kind_mut(kind) else {
                continue;
            };
            match result {
                Ok(set) => {
                    debug!(kind = %kind, records = set.len(), "pulled");
                    entry.pulled = Some(set.len());
                    sets.push(set);
                }
                Err(e) => {
                    entry.pull_error = Some(e.to_string());
                    if e.is_cycle_fatal() {
                        if fatal.is_none() {
                            fatal = Some(e);
                        }
                    } else {
                        warn!(kind = %kind, error = %e, "pull failed, kind skipped this cycle");
                    }
                }
            }
        }

        match fatal {
            Some(e) => Err(e),
            None => Ok(sets),
        }
    }

    /// Drops every pulled record that has a queued delete, so the merge
    /// cannot restore a record the terminal deleted while the remote still
    /// holds it.
    fn withhold_pending_deletes(&self, pulled: &mut [RecordSet]) -> SyncResult<()> {
        let deletes: Vec<QueuedAction> = self
            .db
            .queue()
            .list_all()?
            .into_iter()
            .filter(|action| action.operation == ActionOp::Delete)
            .collect();
        if deletes.is_empty() {
            return Ok(());
        }

        for set in pulled.iter_mut() {
            let kind = set.kind();
            for action in deletes.iter().filter(|action| action.kind() == kind) {
                if set.remove(action.record_id()) {
                    debug!(kind = %kind, id = action.record_id(), "pulled record withheld, delete pending");
                }
            }
        }
        Ok(())
    }

    /// Upserts the merged local set of every kind that was pulled.
    fn push_all(
        &self,
        owner: &str,
        merged_kinds: &[EntityKind],
        report: &mut SyncCycleReport,
    ) -> SyncResult<()> {
        for &kind in merged_kinds {
            self.check_cancelled()?;
            let outcome = match self.remote.compatibility(kind) {
                Compatibility::Incompatible { reason } => {
                    info!(kind = %kind, %reason, "push skipped, schema incompatible");
                    PushOutcome::Incompatible { reason }
                }
                Compatibility::Compatible => {
                    let local = self.db.snapshot(kind)?;
                    match self.remote.upsert(owner, &local) {
                        Ok(upsert) => {
                            for rejection in &upsert.rejected {
                                warn!(kind = %kind, id = %rejection.id, message = %rejection.message, "record rejected");
                            }
                            debug!(kind = %kind, accepted = upsert.accepted, "pushed");
                            PushOutcome::Pushed {
                                accepted: upsert.accepted,
                                rejected: upsert.rejected,
                            }
                        }
                        Err(e) if e.is_cycle_fatal() => return Err(e),
                        Err(e) => {
                            warn!(kind = %kind, error = %e, "push rejected");
                            PushOutcome::Rejected {
                                message: e.to_string(),
                            }
                        }
                    }
                }
            };
            if let Some(entry) = report.kind_mut(kind) {
                entry.push = outcome;
            }
        }
        Ok(())
    }

    /// Replays queued actions in enqueue order, removing each on success.
    fn drain_queue(&self, owner: &str, report: &mut SyncCycleReport) -> SyncResult<()> {
        let queue = self.db.queue();
        for action in queue.list_all()? {
            self.check_cancelled()?;
            let kind = action.kind();
            let replayable = self.config.entity_kinds.contains(&kind)
                && self.remote.compatibility(kind) == Compatibility::Compatible;
            if !replayable {
                report.drain.deferred.push(action.id);
                continue;
            }

            let replayed = self.current_version(&action)?;
            match self.remote.replay(owner, &replayed) {
                Ok(()) => {
                    queue.remove(&action.id)?;
                    report.drain.replayed.push(action.id);
                }
                Err(e) if e.is_cycle_fatal() => return Err(e),
                Err(e) => {
                    warn!(action_id = %action.id, kind = %kind, error = %e, "replay failed, action kept");
                    report.drain.failed.push(QueueFailure {
                        action_id: action.id.clone(),
                        kind,
                        record_id: action.record_id().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Returns `action` carrying the record as it stands locally.
    ///
    /// Creates and updates replay the merged local version, so a version
    /// the merge replaced is never written back to the remote.
    fn current_version(&self, action: &QueuedAction) -> SyncResult<QueuedAction> {
        let mut replayed = action.clone();
        if action.operation != ActionOp::Delete {
            let current = self.db.snapshot(action.kind())?.get(action.record_id());
            if let Some(current) = current {
                replayed.payload = current;
            }
        }
        Ok(replayed)
    }
}

fn transition(state: &mut SyncState, next: SyncState) -> SyncResult<()> {
    if !state.can_transition_to(next) {
        return Err(SyncError::InvalidStateTransition {
            from: state.to_string(),
            to: next.to_string(),
        });
    }
    debug!(from = %state, to = %next, "state transition");
    *state = next;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;
    use chrono::{NaiveDate, TimeZone, Utc};
    use possync_core::DatabaseConfig;
    use possync_protocol::Expense;
    use possync_storage::InMemoryStore;

    fn engine() -> SyncEngine<Arc<MemoryRemote>> {
        let db = Arc::new(LocalDatabase::open(
            Arc::new(InMemoryStore::new()),
            DatabaseConfig::default(),
        ));
        let config = SyncConfig::new("https://pos.supabase.co", "anon-key")
            .with_entity_kinds([EntityKind::Expense]);
        SyncEngine::new(config, Arc::new(MemoryRemote::new()), db)
    }

    fn cashier() -> Identity {
        Identity::new("u1", "alice", "cashier")
    }

    fn expense(id: &str) -> Expense {
        Expense {
            id: id.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            expense_type: "supplies".into(),
            amount: 12.5,
            note: String::new(),
            created_at: Utc.with_ymd_and_hms(2024, 7, 1, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn sync_state_checks() {
        assert!(SyncState::Idle.can_start_sync());
        assert!(SyncState::Online.can_start_sync());
        assert!(SyncState::Error.can_start_sync());
        assert!(!SyncState::Syncing.can_start_sync());
        assert!(!SyncState::Offline.can_start_sync());

        assert!(SyncState::Syncing.is_active());
        assert!(!SyncState::Online.is_active());
    }

    #[test]
    fn transition_table() {
        assert!(SyncState::Idle.can_transition_to(SyncState::Online));
        assert!(SyncState::Error.can_transition_to(SyncState::Online));
        assert!(SyncState::Syncing.can_transition_to(SyncState::Offline));
        assert!(SyncState::Offline.can_transition_to(SyncState::Idle));
        assert!(!SyncState::Idle.can_transition_to(SyncState::Syncing));
        assert!(!SyncState::Offline.can_transition_to(SyncState::Syncing));
        assert!(!SyncState::Syncing.can_transition_to(SyncState::Syncing));
    }

    #[test]
    fn invalid_transition_is_an_error() {
        let mut state = SyncState::Offline;
        assert!(matches!(
            transition(&mut state, SyncState::Syncing),
            Err(SyncError::InvalidStateTransition { .. })
        ));
        assert_eq!(state, SyncState::Offline);
    }

    #[test]
    fn engine_initial_state() {
        let engine = engine();
        assert_eq!(engine.state(), SyncState::Idle);
        assert_eq!(engine.stats().cycles_completed, 0);
        assert!(engine.last_report().is_none());
    }

    #[test]
    fn successful_cycle_goes_online() {
        let engine = engine();
        engine.database().create(expense("e1"), None).unwrap();

        let outcome = engine.sync(Some(&cashier())).unwrap();
        let report = outcome.report().unwrap();
        assert!(report.completed());
        assert_eq!(report.drain.replayed.len(), 1);
        assert_eq!(engine.state(), SyncState::Online);
        assert_eq!(engine.stats().cycles_completed, 1);
        assert!(!engine.database().offline().is_offline().unwrap());
        assert!(engine.database().queue().is_empty().unwrap());
    }

    #[test]
    fn missing_identity_is_a_silent_skip() {
        let engine = engine();
        let outcome = engine.sync(None).unwrap();
        assert_eq!(outcome.skip_reason(), Some(&SkipReason::NoIdentity));
        assert_eq!(engine.state(), SyncState::Idle);
        assert_eq!(engine.remote().pull_count(), 0);
        assert_eq!(engine.stats().cycles_skipped, 1);
    }

    #[test]
    fn cycle_in_flight_is_dropped() {
        let engine = engine();
        engine.in_flight.store(true, Ordering::SeqCst);
        let outcome = engine.sync(Some(&cashier())).unwrap();
        assert_eq!(outcome.skip_reason(), Some(&SkipReason::CycleInFlight));
        assert_eq!(engine.remote().pull_count(), 0);
    }

    #[test]
    fn concurrent_sync_runs_a_single_cycle() {
        let engine = engine();
        let barrier = Arc::new(std::sync::Barrier::new(2));
        engine
            .remote()
            .hold_next_pull_of(EntityKind::Expense, Arc::clone(&barrier));

        std::thread::scope(|scope| {
            let first = scope.spawn(|| engine.sync(Some(&cashier())));
            while !engine.is_syncing() {
                std::thread::yield_now();
            }

            let second = engine.sync(Some(&cashier())).unwrap();
            assert_eq!(second.skip_reason(), Some(&SkipReason::CycleInFlight));

            barrier.wait();
            let first = first.join().unwrap().unwrap();
            assert!(first.report().unwrap().completed());
        });

        assert_eq!(engine.remote().pull_count(), 1);
        assert_eq!(engine.stats().cycles_completed, 1);
        assert_eq!(engine.stats().cycles_skipped, 1);
        assert!(!engine.is_syncing());
    }

    #[test]
    fn offline_engine_skips() {
        let engine = engine();
        engine.set_connectivity(false).unwrap();
        assert_eq!(engine.state(), SyncState::Offline);
        assert!(engine.database().offline().is_offline().unwrap());

        let outcome = engine.sync(Some(&cashier())).unwrap();
        assert_eq!(outcome.skip_reason(), Some(&SkipReason::Offline));

        engine.set_connectivity(true).unwrap();
        assert_eq!(engine.state(), SyncState::Idle);
    }

    #[test]
    fn fatal_error_moves_to_error_and_recovers() {
        let engine = engine();
        engine.remote().set_connected(false);

        assert!(engine.sync(Some(&cashier())).is_err());
        assert_eq!(engine.state(), SyncState::Error);
        assert!(engine.database().offline().is_offline().unwrap());
        assert!(engine.stats().last_error.is_some());
        assert!(!engine.last_report().unwrap().completed());
        assert!(!engine.is_syncing());

        engine.remote().set_connected(true);
        engine.sync(Some(&cashier())).unwrap();
        assert_eq!(engine.state(), SyncState::Online);
        assert!(engine.stats().last_error.is_none());
    }

    #[test]
    fn status_reports_flag_pair() {
        let engine = engine();
        engine.database().create(expense("e1"), None).unwrap();

        let status = engine.status(Some(&cashier())).unwrap();
        assert!(status.configured);
        assert!(!status.offline);
        assert_eq!(status.pending_actions, 1);
        assert!(status.remote_reachable);

        assert!(!engine.status(None).unwrap().configured);

        engine.remote().set_connected(false);
        assert!(!engine.status(None).unwrap().remote_reachable);
    }
}
