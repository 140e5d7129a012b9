//! # innkeep_core
//!
//! Storage engine for innkeep.
//!
//! [`StorageEngine`] is the single entry point for persistence. It selects one
//! of three backends at startup and exposes one asynchronous CRUD contract
//! over whichever is active:
//!
//! - Relational: a remote endpoint reached through [`innkeep_wire`]
//! - Transactional: a local redb store with declared collections and indexes
//! - Flat: one serialized list per collection in an [`innkeep_slots`] space
//!
//! Collections hold schema-less [`Record`]s. Every operation awaits the
//! shared readiness future before it touches a backend.
//!
//! ```no_run
//! use innkeep_core::{EngineConfig, Query, OrderBy, Record, StorageEngine};
//!
//! # async fn demo() -> innkeep_core::StoreResult<()> {
//! let engine = StorageEngine::start(EngineConfig::new())?;
//! let id = engine
//!     .insert("bookings", Record::new().with("bookingDate", "2024-05-01"))
//!     .await?;
//! let latest = engine
//!     .select("bookings", &Query::all().order_by(OrderBy::desc("bookingDate")).limit(2))
//!     .await?;
//! # let _ = (id, latest);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
mod config;
mod engine;
mod error;
mod query;
mod record;
mod schema;
mod seed;
mod snapshot;
mod value;

pub use backend::{BackendKind, StoreAdapter};
pub use config::{EngineConfig, FlatLocation, TransactionalLocation};
pub use engine::{CollectionStats, EnginePhase, EngineStatus, StorageEngine};
pub use error::{AdapterError, AdapterResult, StoreError, StoreResult};
pub use query::{OrderBy, Query};
pub use record::{Record, RecordId};
pub use schema::{CollectionSchema, IndexSpec, StoreSchema, PRESERVED_COLLECTION};
pub use seed::{default_rooms, seed_defaults, SEED_COLLECTION};
pub use snapshot::Snapshot;
pub use value::Value;
