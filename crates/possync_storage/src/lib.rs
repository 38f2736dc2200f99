//! # possync Storage
//!
//! Local key/value store contract and implementations for possync.
//!
//! This crate provides the lowest-level persistence abstraction. Stores
//! hold **whole values per key**: a `set` overwrites the previous value
//! entirely and there are no partial-write semantics.
//!
//! ## Design Principles
//!
//! - Stores are synchronous and must be `Send + Sync`
//! - Each individual `set` is durable and crash-safe once it returns
//! - Stores never interpret the bytes they hold; typed access goes
//!   through [`JsonStoreExt`]
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral terminals
//! - [`FileStore`] - One file per key in a directory, written atomically
//!
//! ## Example
//!
//! ```rust
//! use possync_storage::{InMemoryStore, JsonStoreExt, KeyValueStore};
//!
//! let store = InMemoryStore::new();
//! store.set_json("greeting", &vec!["hello", "world"]).unwrap();
//! let value: Option<Vec<String>> = store.get_json("greeting").unwrap();
//! assert_eq!(value.unwrap(), vec!["hello", "world"]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod json;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use json::JsonStoreExt;
pub use memory::InMemoryStore;
pub use store::{validate_key, KeyValueStore};
