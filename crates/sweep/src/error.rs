//! Sweep error types.

use reaper_storage::StorageError;
use thiserror::Error;

/// Errors that end a sweep, or skip a single marker.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("marker {key}: {source}")]
    MarkerParse {
        key: String,
        #[source]
        source: reaper_core::Error,
    },
}

pub type SweepResult<T> = std::result::Result<T, SweepError>;
