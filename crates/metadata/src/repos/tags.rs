//! Tag repository.
//!
//! Covers both interpretations of the tags table: default-mode folders
//! (`parent_folder >= 1`) and tag-view nodes (`parent_folder = 0`). The
//! nesting DAG and tagged-file sets are stored as serialized id lists on
//! each row; callers read and write whole lists.

use crate::error::MetadataResult;
use async_trait::async_trait;

/// Repository for tag-table operations.
#[async_trait]
pub trait TagRepo: Send + Sync {
    /// Folder id by name within a parent folder.
    async fn folder_id(&self, name: &str, parent_folder: i64) -> MetadataResult<Option<i64>>;

    /// Names of all subfolders of a folder.
    async fn subfolder_names(&self, folder_id: i64) -> MetadataResult<Vec<String>>;

    /// Insert a new folder row.
    async fn insert_folder(&self, name: &str, parent_folder: i64) -> MetadataResult<()>;

    /// Move and/or rename a folder.
    async fn rename_folder(
        &self,
        folder_id: i64,
        new_name: &str,
        new_parent_folder: i64,
    ) -> MetadataResult<()>;

    /// Tag id by its globally unique name.
    async fn tag_id_by_name(&self, name: &str) -> MetadataResult<Option<i64>>;

    /// Tag or folder name by id.
    async fn tag_name(&self, tag_id: i64) -> MetadataResult<Option<String>>;

    /// Parent edge list of a tag.
    async fn parent_ids(&self, tag_id: i64) -> MetadataResult<Vec<i64>>;

    /// Child edge list of a tag.
    async fn child_ids(&self, tag_id: i64) -> MetadataResult<Vec<i64>>;

    /// Tagged file ids of a tag.
    async fn tagged_file_ids(&self, tag_id: i64) -> MetadataResult<Vec<i64>>;

    /// Replace the parent edge list of a tag.
    async fn set_parent_ids(&self, tag_id: i64, parent_ids: &[i64]) -> MetadataResult<()>;

    /// Replace the child edge list of a tag.
    async fn set_child_ids(&self, tag_id: i64, child_ids: &[i64]) -> MetadataResult<()>;

    /// Replace the tagged file ids of a tag.
    async fn set_tagged_file_ids(&self, tag_id: i64, file_ids: &[i64]) -> MetadataResult<()>;

    /// Insert a new tag row with the given parents and no children or
    /// files. Returns the assigned tag id.
    async fn insert_tag(&self, name: &str, parent_ids: &[i64]) -> MetadataResult<i64>;

    /// Rename a tag in place.
    async fn set_tag_name(&self, tag_id: i64, new_name: &str) -> MetadataResult<()>;

    /// Delete a tag or folder row.
    async fn delete_tag_row(&self, tag_id: i64) -> MetadataResult<()>;

    /// Total number of tag-view nodes.
    async fn count_tags(&self) -> MetadataResult<u64>;

    /// Every tag with its name and tagged file ids, for reverse lookups.
    async fn tags_with_files(&self) -> MetadataResult<Vec<(i64, String, Vec<i64>)>>;
}
