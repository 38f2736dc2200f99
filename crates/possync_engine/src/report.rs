//! Structured results of a sync cycle.

use crate::remote::RecordRejection;
use possync_protocol::{EntityKind, MergeReport, Timestamp};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Why a requested cycle did not run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// Nobody is signed in.
    NoIdentity,
    /// The endpoint or credential failed the shape check.
    Unconfigured(String),
    /// Connectivity is down.
    Offline,
    /// Another cycle is still running.
    CycleInFlight,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoIdentity => f.write_str("no signed-in user"),
            SkipReason::Unconfigured(reason) => write!(f, "not configured: {reason}"),
            SkipReason::Offline => f.write_str("offline"),
            SkipReason::CycleInFlight => f.write_str("a cycle is already running"),
        }
    }
}

/// What happened when pushing one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PushOutcome {
    /// Not attempted, because the pull for this kind did not succeed.
    NotAttempted,
    /// The upsert ran; some records may have been refused.
    Pushed {
        /// Records accepted.
        accepted: usize,
        /// Records refused.
        rejected: Vec<RecordRejection>,
    },
    /// The remote refused the whole upsert.
    Rejected {
        /// Remote message.
        message: String,
    },
    /// The kind is not compatible with the remote schema.
    Incompatible {
        /// Why the kind is skipped.
        reason: String,
    },
}

/// Per-kind result of the pull, merge and push steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindReport {
    /// The entity kind.
    pub kind: EntityKind,
    /// Records pulled, if the pull succeeded.
    pub pulled: Option<usize>,
    /// Pull failure, if any.
    pub pull_error: Option<String>,
    /// Merge result, if the merged set was persisted.
    #[serde(skip)]
    pub merge: Option<MergeReport>,
    /// Push result.
    pub push: PushOutcome,
}

impl KindReport {
    pub(crate) fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            pulled: None,
            pull_error: None,
            merge: None,
            push: PushOutcome::NotAttempted,
        }
    }
}

/// A queued action that stayed in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueFailure {
    /// The action id.
    pub action_id: String,
    /// Kind of the affected record.
    pub kind: EntityKind,
    /// Id of the affected record.
    pub record_id: String,
    /// Why it stayed.
    pub message: String,
}

/// Result of draining the action queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Ids of actions replayed and removed.
    pub replayed: Vec<String>,
    /// Actions whose replay failed.
    pub failed: Vec<QueueFailure>,
    /// Actions not replayed because their kind is incompatible.
    pub deferred: Vec<String>,
}

/// Everything one cycle did.
///
/// Per-item failures absorbed by a step end up here instead of aborting
/// the cycle. A cycle that aborted still has a report, describing the
/// steps that ran before the abort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncCycleReport {
    /// Owner id the cycle was scoped to.
    pub owner: String,
    /// When the cycle started.
    pub started_at: Timestamp,
    /// Wall time taken.
    pub duration: Duration,
    /// Per-kind results, in configured order.
    pub kinds: Vec<KindReport>,
    /// Queue drain results.
    pub drain: DrainReport,
    /// The error that aborted the cycle, if any.
    pub error: Option<String>,
}

impl SyncCycleReport {
    pub(crate) fn new(owner: &str, started_at: Timestamp, kinds: &[EntityKind]) -> Self {
        Self {
            owner: owner.to_string(),
            started_at,
            duration: Duration::ZERO,
            kinds: kinds.iter().copied().map(KindReport::new).collect(),
            drain: DrainReport::default(),
            error: None,
        }
    }

    /// Returns true if the cycle ran to the end.
    pub fn completed(&self) -> bool {
        self.error.is_none()
    }

    /// Returns the report for `kind`.
    pub fn kind(&self, kind: EntityKind) -> Option<&KindReport> {
        self.kinds.iter().find(|k| k.kind == kind)
    }

    pub(crate) fn kind_mut(&mut self, kind: EntityKind) -> Option<&mut KindReport> {
        self.kinds.iter_mut().find(|k| k.kind == kind)
    }

    /// Total records pulled.
    pub fn records_pulled(&self) -> usize {
        self.kinds.iter().filter_map(|k| k.pulled).sum()
    }

    /// Total records accepted by upserts.
    pub fn records_pushed(&self) -> usize {
        self.kinds
            .iter()
            .map(|k| match &k.push {
                PushOutcome::Pushed { accepted, .. } => *accepted,
                _ => 0,
            })
            .sum()
    }

    /// Returns true if any step absorbed a failure.
    pub fn has_failures(&self) -> bool {
        !self.drain.failed.is_empty()
            || self.kinds.iter().any(|k| {
                k.pull_error.is_some()
                    || matches!(&k.push, PushOutcome::Rejected { .. })
                    || matches!(&k.push, PushOutcome::Pushed { rejected, .. } if !rejected.is_empty())
            })
    }
}

/// Result of a sync request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The cycle ran to completion.
    Completed(SyncCycleReport),
    /// The cycle did not run.
    Skipped(SkipReason),
}

impl SyncOutcome {
    /// Returns the report if the cycle ran.
    pub fn report(&self) -> Option<&SyncCycleReport> {
        match self {
            SyncOutcome::Completed(report) => Some(report),
            SyncOutcome::Skipped(_) => None,
        }
    }

    /// Returns the skip reason if the cycle did not run.
    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            SyncOutcome::Completed(_) => None,
            SyncOutcome::Skipped(reason) => Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use possync_protocol::now;

    #[test]
    fn totals_and_failures() {
        let mut report = SyncCycleReport::new("u1", now(), &[EntityKind::InventoryItem, EntityKind::Sale]);
        assert!(report.completed());
        assert!(!report.has_failures());

        let item = report.kind_mut(EntityKind::InventoryItem).unwrap();
        item.pulled = Some(3);
        item.push = PushOutcome::Pushed {
            accepted: 4,
            rejected: vec![RecordRejection {
                id: "m9".into(),
                message: "check constraint".into(),
            }],
        };
        report.kind_mut(EntityKind::Sale).unwrap().push = PushOutcome::Incompatible {
            reason: "line items".into(),
        };

        assert_eq!(report.records_pulled(), 3);
        assert_eq!(report.records_pushed(), 4);
        assert!(report.has_failures());
        assert!(report.kind(EntityKind::Expense).is_none());
    }

    #[test]
    fn skip_reasons_display() {
        assert_eq!(SkipReason::Offline.to_string(), "offline");
        assert_eq!(
            SkipReason::Unconfigured("access key is empty".into()).to_string(),
            "not configured: access key is empty"
        );
    }
}
