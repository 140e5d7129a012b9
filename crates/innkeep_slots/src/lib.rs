//! # innkeep slots
//!
//! Flat key-value slot space for innkeep.
//!
//! This crate is the substrate underneath the FlatStore adapter. A slot
//! space maps string keys to string values and nothing else - it has no
//! notion of collections, records, or identifiers. The adapter in
//! `innkeep_core` serializes a whole collection into a single slot.
//!
//! ## Design Principles
//!
//! - Slots are opaque strings; the slot space never parses them
//! - Every write replaces the whole slot value
//! - Implementations must be `Send + Sync` so a store can be shared
//!
//! ## Available Stores
//!
//! - [`InMemorySlots`] - For testing and ephemeral sessions, with an optional quota
//! - [`FileSlots`] - One file per slot inside a directory
//!
//! ## Example
//!
//! ```rust
//! use innkeep_slots::{SlotStore, InMemorySlots};
//!
//! let slots = InMemorySlots::new();
//! slots.set("rooms", "[]").unwrap();
//! assert_eq!(slots.get("rooms").unwrap().as_deref(), Some("[]"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{SlotError, SlotResult};
pub use file::FileSlots;
pub use memory::InMemorySlots;
pub use store::{validate_key, SlotStore};
