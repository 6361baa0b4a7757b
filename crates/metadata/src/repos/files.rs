//! File repository.

use crate::error::MetadataResult;
use crate::models::FileRow;
use async_trait::async_trait;

/// Repository for file-table operations.
#[async_trait]
pub trait FileRepo: Send + Sync {
    /// Get a file by name within a folder.
    async fn get_file(&self, name: &str, parent_folder: i64) -> MetadataResult<Option<FileRow>>;

    /// Get a file's name by id.
    async fn file_name(&self, file_id: i64) -> MetadataResult<Option<String>>;

    /// Get a file's stored hash by id.
    async fn file_hash(&self, file_id: i64) -> MetadataResult<Option<String>>;

    /// Ids of all files directly inside a folder.
    async fn file_ids_in_folder(&self, folder_id: i64) -> MetadataResult<Vec<i64>>;

    /// Names of all files directly inside a folder.
    async fn file_names_in_folder(&self, folder_id: i64) -> MetadataResult<Vec<String>>;

    /// Whether a folder directly contains any file.
    async fn folder_has_files(&self, folder_id: i64) -> MetadataResult<bool>;

    /// Insert a new file row carrying a placeholder token instead of a
    /// content hash. Returns the assigned file id.
    async fn insert_placeholder(
        &self,
        name: &str,
        token: &str,
        parent_folder: i64,
    ) -> MetadataResult<i64>;

    /// Replace a file's hash after a write or truncate, clearing the
    /// placeholder bit.
    async fn set_hash(&self, file_id: i64, hash: &str) -> MetadataResult<()>;

    /// Move and/or rename a file.
    async fn rename_file(
        &self,
        file_id: i64,
        new_name: &str,
        new_parent_folder: i64,
    ) -> MetadataResult<()>;

    /// Delete a file row.
    async fn delete_file_row(&self, file_id: i64) -> MetadataResult<()>;

    /// Whether any file still references a hash (reference count > 0).
    /// Placeholder rows never count towards a reference.
    async fn hash_in_use(&self, hash: &str) -> MetadataResult<bool>;

    /// Whether more than one file references a hash (reference count > 1).
    /// Placeholder rows never count towards a reference.
    async fn hash_shared(&self, hash: &str) -> MetadataResult<bool>;

    /// Total number of file rows.
    async fn count_files(&self) -> MetadataResult<u64>;

    /// Hash column of every placeholder row, used to re-seed the token
    /// counter at startup.
    async fn placeholder_hashes(&self) -> MetadataResult<Vec<String>>;
}
