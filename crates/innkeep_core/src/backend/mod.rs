//! Backend adapters.
//!
//! Every backend implements [`StoreAdapter`], the four primitives the
//! engine dispatches to. The engine holds exactly one adapter at a time
//! and is the only caller.

mod flat;
mod relational;
mod transactional;

pub use flat::FlatAdapter;
pub use relational::{validate_identifier, RelationalAdapter};
pub use transactional::TransactionalAdapter;

use crate::error::{AdapterResult, StoreError};
use crate::query::Query;
use crate::record::{Record, RecordId};
use crate::schema::CollectionSchema;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three storage substrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Remote relational endpoint.
    Relational,
    /// Local transactional store.
    Transactional,
    /// Local flat key-value slots.
    Flat,
}

impl BackendKind {
    /// Returns the identifier used in snapshots and status output.
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Relational => "relational",
            BackendKind::Transactional => "transactional",
            BackendKind::Flat => "flat",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = StoreError;

    /// Accepts the canonical names and the browser-era aliases
    /// `sqlite`, `indexeddb` and `localstorage` found in older exports.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "relational" | "sqlite" => Ok(BackendKind::Relational),
            "transactional" | "indexeddb" => Ok(BackendKind::Transactional),
            "flat" | "localstorage" => Ok(BackendKind::Flat),
            _ => Err(StoreError::InvalidSnapshot(format!("unknown backend {s:?}"))),
        }
    }
}

/// The capability interface every backend implements.
///
/// Each call is one logical operation: it either applies fully or fails.
/// Adapters never retry and report failures with their original cause.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Inserts a record and returns its identifier.
    ///
    /// A record carrying its key field keeps that identifier. Otherwise
    /// the adapter assigns one, which only happens for auto-increment
    /// collections.
    async fn insert(&self, collection: &CollectionSchema, record: Record)
        -> AdapterResult<RecordId>;

    /// Returns the records matching `query`.
    async fn select(&self, collection: &CollectionSchema, query: &Query)
        -> AdapterResult<Vec<Record>>;

    /// Merges `patch` into an existing record.
    ///
    /// Fails with [`AdapterError::NotFound`](crate::AdapterError::NotFound)
    /// if the record does not exist.
    async fn update(
        &self,
        collection: &CollectionSchema,
        id: &RecordId,
        patch: Record,
    ) -> AdapterResult<()>;

    /// Deletes a record. Deleting a missing record is not an error.
    async fn delete(&self, collection: &CollectionSchema, id: &RecordId) -> AdapterResult<()>;
}
