//! The filesystem model.
//!
//! Folder-side operations (default mode) live in [`folders`], tag-side
//! operations (tag view) in [`tags`]. Both are methods on [`FsModel`],
//! which owns the metadata store and the blob directory. Everything here
//! runs on the dispatcher's single thread, one request at a time.

mod folders;
mod tags;

use tagfs_blobstore::{BlobError, BlobStore};
use tagfs_core::placeholder;
use tagfs_metadata::{FileRepo, MetadataError, SqliteStore};
use thiserror::Error;

/// Filesystem model operation errors.
///
/// Expected failures map onto POSIX error codes for the bridge wire
/// protocol; the operator surface renders them as message text instead.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no such entry: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    Exists(String),

    #[error("not empty: {0}")]
    NotEmpty(String),

    #[error("nesting {child} under {parent} would form a cycle")]
    Cycle { child: String, parent: String },

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("blob store error: {0}")]
    Blob(#[from] BlobError),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),
}

impl ModelError {
    /// The POSIX error code reported to the filesystem bridge.
    pub fn to_errno(&self) -> i32 {
        match self {
            ModelError::NotFound(_) => libc::ENOENT,
            ModelError::Exists(_) => libc::EEXIST,
            ModelError::NotEmpty(_) => libc::ENOTEMPTY,
            ModelError::Cycle { .. } => libc::ELOOP,
            ModelError::Unsupported(_) => libc::EINVAL,
            ModelError::Blob(BlobError::Io(e)) => e.raw_os_error().unwrap_or(libc::EIO),
            ModelError::Blob(_) => libc::EIO,
            ModelError::Metadata(_) => libc::EIO,
        }
    }
}

/// Result type for model operations.
pub type ModelResult<T> = std::result::Result<T, ModelError>;

/// The filesystem model: folder and tag semantics over the metadata store
/// and the content-addressed blob directory.
pub struct FsModel {
    meta: SqliteStore,
    blobs: BlobStore,
    /// Serial of the next placeholder token.
    next_placeholder: u64,
}

impl FsModel {
    /// Build the model, re-seeding the placeholder counter from any
    /// placeholder rows that survived a previous run.
    pub async fn new(meta: SqliteStore, blobs: BlobStore) -> ModelResult<Self> {
        let next_placeholder = meta
            .placeholder_hashes()
            .await?
            .iter()
            .filter_map(|token| placeholder::serial(token))
            .max()
            .map_or(1, |max| max + 1);
        Ok(Self {
            meta,
            blobs,
            next_placeholder,
        })
    }

    /// The underlying metadata store (used for the shutdown flush).
    pub fn metadata(&self) -> &SqliteStore {
        &self.meta
    }

    /// The underlying blob directory.
    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Allocate the next placeholder token.
    pub(crate) fn allocate_placeholder(&mut self) -> String {
        let token = placeholder::token(self.next_placeholder);
        self.next_placeholder += 1;
        token
    }
}
