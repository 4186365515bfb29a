//! Cache error types.

use thiserror::Error;

/// Errors from the Key-Value layer.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The store could not be opened.
    #[error("Failed to open store: {0}")]
    Open(String),

    /// A value could not be encoded or decoded as JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend failed an operation.
    #[error("Store {operation} failed: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },

    /// Other writers kept winning until the retries ran out.
    #[error("Concurrent modification of {key} after {attempts} attempts")]
    ConcurrentModification { key: String, attempts: u32 },
}

impl CacheError {
    pub(crate) fn backend(operation: &'static str, err: impl std::fmt::Display) -> Self {
        CacheError::Backend {
            operation,
            message: err.to_string(),
        }
    }

    /// Whether the error is a lost optimistic-concurrency race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, CacheError::ConcurrentModification { .. })
    }
}
