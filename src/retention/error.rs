use thiserror::Error;

use crate::archive::StorageError;
use crate::config::ValidationError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum RetentionError {
    #[error("Invalid retention config: {0}")]
    InvalidConfig(#[from] ValidationError),

    #[error("Repository error: {0}")]
    Repository(#[from] StoreError),

    #[error("Archival failed: {0}")]
    Archival(#[source] StorageError),

    #[error("Archive not found: {0}")]
    NotFound(String),

    #[error("Corrupt archive {filename}: {reason}")]
    CorruptArchive { filename: String, reason: String },

    #[error("Cannot archive an empty batch")]
    EmptyBatch,
}

/// Retention result type
pub type Result<T> = std::result::Result<T, RetentionError>;
