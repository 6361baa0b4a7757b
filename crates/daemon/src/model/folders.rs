//! Folder-side operations: the default-mode directory tree.

use super::{FsModel, ModelError, ModelResult};
use std::path::PathBuf;
use tagfs_core::path;
use tagfs_metadata::{FOLDER_ROOT_ID, FileRepo, TagRepo};

impl FsModel {
    /// Walk a component list down from the root folder.
    pub(crate) async fn resolve_folder(&self, parts: &[String]) -> ModelResult<i64> {
        let mut folder = FOLDER_ROOT_ID;
        for part in parts {
            folder = self
                .meta
                .folder_id(part, folder)
                .await?
                .ok_or_else(|| ModelError::NotFound(format!("/{}", parts.join("/"))))?;
        }
        Ok(folder)
    }

    /// Resolve a mounted path into its parent folder id and leaf name.
    pub(crate) async fn resolve_parent(&self, mounted: &str) -> ModelResult<(i64, String)> {
        let mut parts = path::components(mounted);
        let name = parts.pop().unwrap_or_default();
        let parent = self.resolve_folder(&parts).await?;
        Ok((parent, name))
    }

    /// Whether a mounted path names an existing folder.
    pub async fn folder_exists(&self, mounted: &str) -> ModelResult<bool> {
        let parts = path::components(mounted);
        match self.resolve_folder(&parts).await {
            Ok(_) => Ok(true),
            Err(ModelError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// The real blob path behind a mounted file path, if the file exists.
    ///
    /// Freshly created files still carrying a placeholder token resolve
    /// like any other file; the placeholder names their empty blob.
    pub async fn file_path(&self, mounted: &str) -> ModelResult<Option<PathBuf>> {
        let (parent, name) = match self.resolve_parent(mounted).await {
            Ok(resolved) => resolved,
            Err(ModelError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        match self.meta.get_file(&name, parent).await? {
            Some(row) => Ok(Some(self.blobs.blob_path(&row.hash)?)),
            None => Ok(None),
        }
    }

    /// Subfolder names followed by file names. A missing folder lists as
    /// empty; the bridge has already answered the directory check.
    pub async fn list_folder(&self, mounted: &str) -> ModelResult<Vec<String>> {
        let parts = path::components(mounted);
        let folder = match self.resolve_folder(&parts).await {
            Ok(folder) => folder,
            Err(ModelError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut contents = self.meta.subfolder_names(folder).await?;
        contents.extend(self.meta.file_names_in_folder(folder).await?);
        Ok(contents)
    }

    /// Create a folder. Fails with *exists* when any sibling, file or
    /// folder, carries the name.
    pub async fn create_folder(&self, mounted: &str) -> ModelResult<()> {
        let (parent, name) = self.resolve_parent(mounted).await?;
        if name.is_empty() {
            return Err(ModelError::NotFound(mounted.to_string()));
        }
        if self.meta.get_file(&name, parent).await?.is_some()
            || self.meta.folder_id(&name, parent).await?.is_some()
        {
            return Err(ModelError::Exists(mounted.to_string()));
        }
        self.meta.insert_folder(&name, parent).await?;
        Ok(())
    }

    /// Delete a folder. Only direct files are consulted for emptiness;
    /// a folder whose descendants hold files always has a non-empty
    /// ancestor chain blocking deletion from below.
    pub async fn delete_folder(&self, mounted: &str) -> ModelResult<()> {
        let parts = path::components(mounted);
        if parts.is_empty() {
            return Err(ModelError::NotFound(mounted.to_string()));
        }
        let folder = self.resolve_folder(&parts).await?;
        if self.meta.folder_has_files(folder).await? {
            return Err(ModelError::NotEmpty(mounted.to_string()));
        }
        self.meta.delete_tag_row(folder).await?;
        Ok(())
    }

    /// Create a file row for the bridge's create operation.
    ///
    /// Allocates a placeholder token, records it in place of the content
    /// hash, and returns the blob path where the bridge creates the empty
    /// file. The hash is corrected on the next write-release or truncate.
    pub async fn create_file(&mut self, mounted: &str) -> ModelResult<PathBuf> {
        let (parent, name) = self.resolve_parent(mounted).await?;
        if name.is_empty() {
            return Err(ModelError::NotFound(mounted.to_string()));
        }
        if self.meta.get_file(&name, parent).await?.is_some()
            || self.meta.folder_id(&name, parent).await?.is_some()
        {
            return Err(ModelError::Exists(mounted.to_string()));
        }
        let token = self.allocate_placeholder();
        self.meta.insert_placeholder(&name, &token, parent).await?;
        Ok(self.blobs.blob_path(&token)?)
    }

    /// Truncate a file to `len` bytes.
    ///
    /// When other files share the blob, the truncate happens on a
    /// `.TRUNCATE` shadow copy that diverges into its own blob; otherwise
    /// the blob is truncated in place. Either way the result is rehashed
    /// and renamed under its new digest.
    pub async fn truncate_file(&self, len: u64, mounted: &str) -> ModelResult<()> {
        let (parent, name) = self.resolve_parent(mounted).await?;
        let row = self
            .meta
            .get_file(&name, parent)
            .await?
            .ok_or_else(|| ModelError::NotFound(mounted.to_string()))?;

        let shared = self.meta.hash_shared(&row.hash).await?;
        let target = if shared {
            self.blobs.copy_to_truncate_shadow(&row.hash).await?
        } else {
            self.blobs.blob_path(&row.hash)?
        };

        self.blobs.truncate(&target, len).await?;
        let new_hash = self.blobs.hash_file(&target).await?;
        if new_hash.to_hex() != row.hash {
            self.blobs.promote(&target, &new_hash).await?;
            self.meta.set_hash(row.file_id, &new_hash.to_hex()).await?;
        } else if shared {
            // Content unchanged, the shadow copy is redundant.
            self.blobs.remove(&target).await?;
        }
        Ok(())
    }

    /// Promote the `.WRITE` shadow after a release, if the bridge left one.
    ///
    /// The shadow is renamed under its digest, the row updated, and the old
    /// blob removed once nothing references it any more. A release without
    /// a preceding write is a no-op.
    pub async fn update_file(&self, mounted: &str) -> ModelResult<()> {
        let (parent, name) = match self.resolve_parent(mounted).await {
            Ok(resolved) => resolved,
            Err(ModelError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };
        let Some(row) = self.meta.get_file(&name, parent).await? else {
            return Ok(());
        };

        let shadow = self.blobs.write_shadow_path(&row.hash)?;
        if !self.blobs.exists(&shadow).await? {
            return Ok(());
        }

        let new_hash = self.blobs.hash_file(&shadow).await?;
        if new_hash.to_hex() != row.hash {
            self.blobs.promote(&shadow, &new_hash).await?;
            self.meta.set_hash(row.file_id, &new_hash.to_hex()).await?;
            if !self.meta.hash_in_use(&row.hash).await? {
                self.blobs.remove(&self.blobs.blob_path(&row.hash)?).await?;
            }
        } else {
            self.blobs.remove(&shadow).await?;
        }
        Ok(())
    }

    /// Delete a file: unlink the blob if this was the last reference, then
    /// drop the row and its id from every tag. Returns the tags it was
    /// removed from so a replacing rename can re-attach them.
    pub async fn delete_file(&self, mounted: &str) -> ModelResult<Vec<i64>> {
        let (parent, name) = self.resolve_parent(mounted).await?;
        let row = self
            .meta
            .get_file(&name, parent)
            .await?
            .ok_or_else(|| ModelError::NotFound(mounted.to_string()))?;

        if !self.meta.hash_shared(&row.hash).await? {
            self.blobs.remove(&self.blobs.blob_path(&row.hash)?).await?;
        }

        let mut removed_from = Vec::new();
        for (tag_id, _, file_ids) in self.meta.tags_with_files().await? {
            if file_ids.contains(&row.file_id) {
                let remaining: Vec<i64> = file_ids
                    .into_iter()
                    .filter(|id| *id != row.file_id)
                    .collect();
                self.meta.set_tagged_file_ids(tag_id, &remaining).await?;
                removed_from.push(tag_id);
            }
        }
        self.meta.delete_file_row(row.file_id).await?;
        Ok(removed_from)
    }

    /// Move or rename a file or folder.
    ///
    /// Legal cases: file onto nothing or onto an existing file (which is
    /// replaced, its tag memberships carried over to the source), and
    /// folder onto nothing. A destination name that collides with a file
    /// already tagged alongside the source in any of its tags is rejected,
    /// since both would then list under one tag with one name.
    pub async fn rename_path(&self, old: &str, new: &str) -> ModelResult<()> {
        let (old_file, old_folder) = match self.resolve_parent(old).await {
            Ok((parent, name)) => (
                self.meta.get_file(&name, parent).await?,
                self.meta.folder_id(&name, parent).await?,
            ),
            Err(ModelError::NotFound(_)) => (None, None),
            Err(e) => return Err(e),
        };

        let (new_parent, new_name) = self.resolve_parent(new).await?;
        let new_file = self.meta.get_file(&new_name, new_parent).await?;
        let new_folder = self.meta.folder_id(&new_name, new_parent).await?;

        if let Some(old_file) = &old_file
            && new_folder.is_none()
        {
            if let Some(replaced) = &new_file
                && replaced.file_id == old_file.file_id
            {
                return Ok(());
            }

            for (_, _, file_ids) in self.meta.tags_with_files().await? {
                if !file_ids.contains(&old_file.file_id) {
                    continue;
                }
                for other in file_ids {
                    if other != old_file.file_id
                        && self.meta.file_name(other).await?.as_deref() == Some(&new_name)
                    {
                        return Err(ModelError::Exists(new.to_string()));
                    }
                }
            }

            let mut reattach = Vec::new();
            if new_file.is_some() {
                reattach = self.delete_file(new).await?;
            }
            self.meta
                .rename_file(old_file.file_id, &new_name, new_parent)
                .await?;
            for tag_id in reattach {
                let mut ids = self.meta.tagged_file_ids(tag_id).await?;
                ids.push(old_file.file_id);
                self.meta.set_tagged_file_ids(tag_id, &ids).await?;
            }
            Ok(())
        } else if let Some(old_folder) = old_folder
            && new_folder.is_none()
            && new_file.is_none()
        {
            self.meta
                .rename_folder(old_folder, &new_name, new_parent)
                .await?;
            Ok(())
        } else if old_file.is_none() && old_folder.is_none() {
            Err(ModelError::NotFound(old.to_string()))
        } else {
            Err(ModelError::Exists(new.to_string()))
        }
    }
}
