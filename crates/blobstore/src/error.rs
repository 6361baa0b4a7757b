//! Blob store error types.

use thiserror::Error;

/// Blob store operation errors.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid blob name: {0}")]
    InvalidName(String),
}

/// Result type for blob store operations.
pub type BlobResult<T> = std::result::Result<T, BlobError>;
