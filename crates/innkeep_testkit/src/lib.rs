//! # innkeep Testkit
//!
//! Test utilities for innkeep.
//!
//! This crate provides:
//! - Engine fixtures pinned to each backend, with automatic cleanup
//! - Relational endpoints that are reachable, unreachable or slow
//! - Property-based generators for values and records
//!
//! ## Usage
//!
//! ```rust,ignore
//! use innkeep_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn works_on_flat() {
//!     let store = TestStore::flat().await;
//!     store.insert("tasks", Record::new().with("type", "cleaning")).await.unwrap();
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
    pub use innkeep_core::{BackendKind, Query, Record, RecordId, StorageEngine, Value};
}

pub use fixtures::*;
pub use generators::*;
