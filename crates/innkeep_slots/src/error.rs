//! Error types for slot operations.

use std::io;
use thiserror::Error;

/// Result type for slot operations.
pub type SlotResult<T> = Result<T, SlotError>;

/// Errors that can occur during slot operations.
#[derive(Debug, Error)]
pub enum SlotError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The key cannot be used as a slot name.
    #[error("invalid slot key: {0:?}")]
    InvalidKey(String),

    /// Writing the value would exceed the store's quota.
    #[error("quota exceeded writing slot {key}: {needed} bytes needed, quota {quota}")]
    QuotaExceeded {
        /// The slot being written.
        key: String,
        /// Total bytes the store would hold after the write.
        needed: usize,
        /// The configured quota in bytes.
        quota: usize,
    },

    /// A stored slot is not valid UTF-8.
    #[error("slot corrupted: {0}")]
    Corrupted(String),
}
