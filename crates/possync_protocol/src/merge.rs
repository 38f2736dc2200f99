//! Record-granular reconciliation of local and remote record sets.
//!
//! The remote set is the baseline. Each local record is overlaid on it:
//! a local record whose id the remote lacks is inserted; a local record
//! sharing an id with a remote one replaces it **only** when both carry an
//! update instant and the local one is strictly later. Equal instants, or
//! a missing instant on either side, keep the remote version.
//!
//! Whole records are replaced, never individual fields.
//!
//! Output order is the remote order, followed by local-only records in
//! local order. With that order `merge` is idempotent:
//! `merge(&merge(l, r), r) == merge(l, r)`.

use crate::record::Record;
use std::collections::{HashMap, HashSet};

/// Which side wins when a local and a remote record share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    /// The remote version stays.
    KeepRemote,
    /// The local version replaces the remote one.
    TakeLocal,
}

/// Decides between two versions of the same record.
///
/// Local wins iff both update instants are present and local is strictly
/// later. Every other combination keeps the remote version.
pub fn resolve_pair<R: Record>(local: &R, remote: &R) -> MergeDecision {
    match (local.updated_at(), remote.updated_at()) {
        (Some(local_at), Some(remote_at)) if local_at > remote_at => MergeDecision::TakeLocal,
        _ => MergeDecision::KeepRemote,
    }
}

/// Counts describing how a merge was resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Shared ids where the remote version was kept.
    pub remote_kept: usize,
    /// Shared ids where the local version replaced the remote one.
    pub local_applied: usize,
    /// Records present only locally.
    pub local_only: usize,
    /// Records present only remotely.
    pub remote_only: usize,
}

impl MergeReport {
    /// Returns true if the merged set differs from the remote set.
    pub fn changes_remote(&self) -> bool {
        self.local_applied > 0 || self.local_only > 0
    }
}

/// The merged records together with their [`MergeReport`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome<R> {
    /// The authoritative merged set.
    pub records: Vec<R>,
    /// How each id was resolved.
    pub report: MergeReport,
}

/// Merges a local and a remote record set into one authoritative set.
///
/// See the module documentation for the rules.
pub fn merge<R: Record>(local: &[R], remote: &[R]) -> Vec<R> {
    merge_with_report(local, remote).records
}

/// Merges like [`merge`] and reports how every id was resolved.
pub fn merge_with_report<R: Record>(local: &[R], remote: &[R]) -> MergeOutcome<R> {
    let mut records: Vec<R> = Vec::with_capacity(local.len() + remote.len());
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(local.len() + remote.len());

    for record in remote {
        match index.get(record.id()) {
            Some(&slot) => records[slot] = record.clone(),
            None => {
                index.insert(record.id(), records.len());
                records.push(record.clone());
            }
        }
    }

    let remote_len = records.len();
    let mut report = MergeReport::default();
    let mut shared: HashSet<usize> = HashSet::new();

    for record in local {
        match index.get(record.id()).copied() {
            None => {
                index.insert(record.id(), records.len());
                records.push(record.clone());
                report.local_only += 1;
            }
            // Repeated local id: the later local copy wins.
            Some(slot) if slot >= remote_len => records[slot] = record.clone(),
            Some(slot) => {
                if !shared.insert(slot) {
                    // Already resolved against the remote version once.
                    if resolve_pair(record, &records[slot]) == MergeDecision::TakeLocal {
                        records[slot] = record.clone();
                    }
                    continue;
                }
                match resolve_pair(record, &records[slot]) {
                    MergeDecision::TakeLocal => {
                        records[slot] = record.clone();
                        report.local_applied += 1;
                    }
                    MergeDecision::KeepRemote => report.remote_kept += 1,
                }
            }
        }
    }

    report.remote_only = remote_len - shared.len();

    MergeOutcome { records, report }
}
