//! # possync Engine
//!
//! Sync orchestrator for an offline-first point-of-sale terminal.
//!
//! This crate provides:
//! - [`SyncConfig`] and the [`ConfigGate`] evaluated before every cycle
//! - [`RemoteClient`], the contract for the canonical remote store, with
//!   [`MemoryRemote`] and the PostgREST-style [`RestRemote`]
//! - [`SyncEngine`], the state machine running one cycle at a time
//! - [`AutoSync`], the tokio scheduler driving cycles from a timer,
//!   explicit triggers and connectivity changes
//!
//! ## Cycle
//!
//! One cycle runs these steps in order:
//! 1. Evaluate the gate (identity, endpoint shape, credential)
//! 2. Pull every configured entity kind, concurrently
//! 3. Merge each successful pull into the local set and persist it
//! 4. Upsert the merged local sets to the remote
//! 5. Drain the action queue, removing each action once replayed
//!
//! ## Key Invariants
//!
//! - Local persistence happens before any push
//! - A connectivity failure during pulls leaves the local store untouched
//! - At most one cycle runs at a time; extra triggers are dropped
//! - Per-record and per-action failures never abort a cycle
//! - Failed queued actions stay queued for the next cycle

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod gate;
mod http;
mod remote;
mod report;
mod scheduler;
mod state;

pub use config::{SyncConfig, DEFAULT_SYNC_INTERVAL, DEFAULT_TIMEOUT};
pub use error::{SyncError, SyncResult};
pub use gate::{ConfigGate, GateDecision, PLACEHOLDER_MARKERS};
pub use http::{HttpClient, HttpRequest, HttpResponse, Method, RestRemote, TransportError};
pub use remote::{Compatibility, MemoryRemote, RecordRejection, RemoteClient, UpsertOutcome};
pub use report::{
    DrainReport, KindReport, PushOutcome, QueueFailure, SkipReason, SyncCycleReport, SyncOutcome,
};
pub use scheduler::{AutoSync, AutoSyncHandle, SyncEvent, SyncTrigger};
pub use state::{SyncEngine, SyncState, SyncStats, SyncStatus};
