//! # possync Core
//!
//! Local persistence for an offline-first point-of-sale terminal.
//!
//! This crate provides:
//! - [`ActionQueue`] - durable FIFO of mutations pending remote confirmation
//! - [`AuditLog`] - capped, append-only history of every mutation
//! - [`RecordCollections`] - whole record sets per entity kind
//! - [`OfflineFlag`] - the persisted `offline` half of the sync state
//! - [`LocalDatabase`] - the mutation facade tying them together
//! - [`Identity`] and [`IdentityProvider`] - who is acting
//!
//! Everything here sits on a [`possync_storage::KeyValueStore`] and is
//! synchronous.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod audit;
mod collections;
mod config;
mod database;
mod error;
mod flags;
mod identity;
pub mod keys;
mod queue;

pub use audit::AuditLog;
pub use collections::RecordCollections;
pub use config::{DatabaseConfig, DEFAULT_AUDIT_CAPACITY};
pub use database::{LocalDatabase, Mutation};
pub use error::{CoreError, CoreResult};
pub use flags::OfflineFlag;
pub use identity::{Identity, IdentityProvider, SessionStore, StaticIdentity};
pub use queue::ActionQueue;

/// Crate version, as recorded in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
