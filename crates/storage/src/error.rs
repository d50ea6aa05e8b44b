//! Storage error types.

use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("S3 error: {0}")]
    S3(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid continuation token: {0}")]
    InvalidContinuationToken(String),

    /// A listing that is consumed as a single response came back paginated.
    #[error(
        "{operation} under {prefix:?} returned a truncated result; pagination is not implemented for this listing, refusing to continue with a partial set"
    )]
    Truncated {
        operation: &'static str,
        prefix: String,
    },
}

impl StorageError {
    /// Returns true for the missing-object case callers treat as a soft failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
