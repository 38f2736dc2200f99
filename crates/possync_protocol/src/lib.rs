//! # possync Protocol
//!
//! Record types, queued actions, audit entries and the merge engine.
//!
//! This crate provides:
//! - [`Record`] and the four synchronized entity types
//! - [`EntityPayload`] and [`RecordSet`], tagged unions keyed by [`EntityKind`]
//! - [`QueuedAction`] for mutations awaiting remote confirmation
//! - [`AuditLogEntry`] for the local mutation history
//! - [`merge`], the record-granular reconciliation of local and remote sets
//!
//! This is a pure crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod action;
mod audit;
mod entity;
mod error;
mod merge;
mod payload;
mod record;
mod timestamp;

pub use action::{ActionOp, QueuedAction};
pub use audit::{AuditLogEntry, AuditQuery, SYSTEM_ACTOR_ID, SYSTEM_ACTOR_NAME};
pub use entity::{EntityKind, Expense, InventoryItem, LineItem, Refund, Sale};
pub use error::{ProtocolError, ProtocolResult};
pub use merge::{merge, merge_with_report, resolve_pair, MergeDecision, MergeOutcome, MergeReport};
pub use payload::{EntityPayload, RecordSet};
pub use record::Record;
pub use timestamp::{now, parse_timestamp, Timestamp};
