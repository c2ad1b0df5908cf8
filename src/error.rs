//! Error types for the Floodgate library.

use thiserror::Error;

use crate::store::StoreError;

/// Main error type for Floodgate operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid quota parameters or an undecidable per-call cost
    #[error("configuration error: {0}")]
    Config(String),

    /// The backing store could not be reached or timed out
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Optimistic concurrency retry budget exhausted
    #[error("compare-and-swap contention exhausted after {attempts} attempts for key {key}")]
    Contention { key: String, attempts: u32 },

    /// Per-key state could not be encoded for storage
    #[error("state encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// I/O errors (configuration loading)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Floodgate operations.
pub type Result<T> = std::result::Result<T, Error>;
