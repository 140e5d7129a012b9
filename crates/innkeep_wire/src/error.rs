//! Error types for the relational wire layer.

use thiserror::Error;

/// Result type for wire operations.
pub type WireResult<T> = Result<T, WireError>;

/// Errors that can occur talking to a relational endpoint.
#[derive(Error, Debug)]
pub enum WireError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the call could succeed if repeated.
        retryable: bool,
    },

    /// The endpoint answered with a non-success status.
    #[error("endpoint returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// Malformed message on the wire.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The endpoint rejected the query.
    #[error("query failed: {0}")]
    Query(String),

    /// The endpoint is not reachable.
    #[error("endpoint unavailable")]
    Unavailable,

    /// The call did not complete in time.
    #[error("operation timed out")]
    Timeout,

    /// The configured endpoint URL cannot be used.
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),

    /// I/O error on the connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WireError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if repeating the call could succeed.
    ///
    /// The adapter never retries on its own; this is for callers that do.
    pub fn is_retryable(&self) -> bool {
        match self {
            WireError::Transport { retryable, .. } => *retryable,
            WireError::Timeout | WireError::Unavailable | WireError::Io(_) => true,
            WireError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
