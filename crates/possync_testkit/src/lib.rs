//! # possync Testkit
//!
//! Test utilities for possync.
//!
//! This crate provides:
//! - [`TestTerminal`], a local database wired to an in-process remote
//! - Record builders with fixed, readable timestamps
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use possync_testkit::prelude::*;
//!
//! #[test]
//! fn local_sale_reaches_remote() {
//!     let terminal = TestTerminal::new();
//!     terminal.db.create(sale("s1", 10.0), None).unwrap();
//!     terminal.sync().unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
