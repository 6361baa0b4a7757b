//! Metadata store error types.

use thiserror::Error;

/// Metadata store operation errors.
///
/// Missing rows are not errors at this layer; lookups return `Option` and
/// the filesystem model decides what absence means.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("schema mismatch in backing file: {0}")]
    SchemaMismatch(String),

    #[error("backing file error: {0}")]
    Backing(#[from] std::io::Error),
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
