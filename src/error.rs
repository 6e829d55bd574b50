use std::time::Duration;

use thiserror::Error;

/// Result alias for `quarry`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the clustering primitives and the analytics pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Input was empty.
    #[error("empty input provided")]
    EmptyInput,

    /// Vector dimension mismatch.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// Invalid number of clusters requested.
    #[error("cannot create {requested} clusters from {n_items} items")]
    InvalidClusterCount {
        /// Requested count.
        requested: usize,
        /// Number of items.
        n_items: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: String,
    },

    /// Event or report store failure.
    #[error("store error: {0}")]
    Store(String),

    /// Text generation failure.
    #[error("text generation error: {0}")]
    Generation(String),

    /// A collaborator call did not complete within its budget.
    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        /// Collaborator operation that stalled.
        operation: &'static str,
        /// Budget that elapsed.
        elapsed: Duration,
    },

    /// Requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON encoding or decoding failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}
