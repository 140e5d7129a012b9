//! Error types for the storage engine and its backend adapters.

use crate::backend::BackendKind;
use crate::record::RecordId;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for engine operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for adapter primitives.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Errors surfaced to callers of the storage engine.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No backend could be initialized.
    #[error("no storage backend is available")]
    BackendUnavailable,

    /// An update targeted an identifier absent from the collection.
    #[error("record {id} not found in {collection}")]
    RecordNotFound {
        /// Collection searched.
        collection: String,
        /// Identifier that was not found.
        id: String,
    },

    /// The active adapter's underlying call failed.
    #[error("{backend} backend call failed: {source}")]
    BackendCallFailed {
        /// Backend that was active.
        backend: BackendKind,
        /// Original cause.
        #[source]
        source: AdapterError,
    },

    /// An import document lacks the expected top-level structure.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// The collection is not part of the configured schema.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// A collection or field name cannot be used by the backend.
    #[error("invalid name: {0:?}")]
    InvalidName(String),

    /// A record or identifier has the wrong shape.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Backend selection did not finish within the allowed time.
    #[error("storage engine not ready after {waited:?}")]
    NotReady {
        /// How long the caller waited.
        waited: Duration,
    },

    /// There is nothing to export.
    #[error("collection {0} is empty")]
    EmptyCollection(String),

    /// CSV encoding failed.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Creates a record-not-found error.
    pub fn not_found(collection: &str, id: impl ToString) -> Self {
        Self::RecordNotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    /// Normalises an adapter failure into the caller-facing taxonomy.
    ///
    /// Missing records and name/shape errors keep their own variants;
    /// everything else is reported as a failed backend call with the
    /// original cause attached.
    pub fn from_adapter(
        backend: BackendKind,
        collection: &str,
        id: Option<&RecordId>,
        error: AdapterError,
    ) -> Self {
        match error {
            AdapterError::NotFound => Self::RecordNotFound {
                collection: collection.to_string(),
                id: id.map(ToString::to_string).unwrap_or_default(),
            },
            AdapterError::UnknownCollection(name) => Self::UnknownCollection(name),
            AdapterError::InvalidName(name) => Self::InvalidName(name),
            AdapterError::InvalidRecord(message) => Self::InvalidRecord(message),
            source => Self::BackendCallFailed { backend, source },
        }
    }
}

/// Errors raised by backend adapters.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The targeted record does not exist.
    #[error("record not found")]
    NotFound,

    /// The relational endpoint failed.
    #[error(transparent)]
    Wire(#[from] innkeep_wire::WireError),

    /// The transactional store failed.
    #[error("transactional store error: {0}")]
    Redb(#[from] redb::Error),

    /// The flat slot space failed.
    #[error(transparent)]
    Slots(#[from] innkeep_slots::SlotError),

    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A uniqueness constraint was violated.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// The collection was not declared when the store was opened.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// The stored schema is newer than the requested one.
    #[error("store is at schema version {stored}, cannot open at version {requested}")]
    VersionDowngrade {
        /// Version found in the store.
        stored: u32,
        /// Version requested by the caller.
        requested: u32,
    },

    /// A name cannot be used as an identifier.
    #[error("invalid name: {0:?}")]
    InvalidName(String),

    /// A record or identifier has the wrong shape.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// The endpoint answered with something unusable.
    #[error("unexpected response: {0}")]
    Protocol(String),

    /// Local file system error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

impl AdapterError {
    /// Creates a serialization error.
    pub fn serialization(message: impl ToString) -> Self {
        Self::Serialization(message.to_string())
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<tokio::task::JoinError> for AdapterError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}

macro_rules! redb_error_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for AdapterError {
                fn from(e: $ty) -> Self {
                    Self::Redb(e.into())
                }
            }
        )*
    };
}

redb_error_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);
