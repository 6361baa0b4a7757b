//! Tag-side operations: the tag-view graph.

use super::{FsModel, ModelError, ModelResult};
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use tagfs_core::path;
use tagfs_metadata::models::StoreStats;
use tagfs_metadata::{FileRepo, TAG_ROOT_ID, TagRepo};

impl FsModel {
    /// All unique ancestors of a tag, the tag itself included. The
    /// sentinel root is never part of the set.
    pub(crate) async fn ancestor_ids(&self, tag_id: i64) -> ModelResult<HashSet<i64>> {
        let mut ancestors = HashSet::new();
        let mut stack = vec![tag_id];
        while let Some(id) = stack.pop() {
            if id == TAG_ROOT_ID || !ancestors.insert(id) {
                continue;
            }
            stack.extend(self.meta.parent_ids(id).await?);
        }
        Ok(ancestors)
    }

    /// Resolve a tag name or tag-view path to a tag id.
    ///
    /// A path resolves through its leaf; the remaining components must all
    /// be ancestors of the leaf, in any order. Partial and reordered
    /// ancestor chains therefore resolve to the same tag. `/` is the
    /// sentinel root.
    pub async fn resolve_tag(&self, tag_or_path: &str) -> ModelResult<Option<i64>> {
        if tag_or_path.is_empty() {
            return Ok(None);
        }
        if tag_or_path == "/" {
            return Ok(Some(TAG_ROOT_ID));
        }
        if !tag_or_path.starts_with('/') {
            return Ok(self.meta.tag_id_by_name(tag_or_path).await?);
        }

        let mut parts = path::components(tag_or_path);
        let Some(leaf) = parts.pop() else {
            return Ok(None);
        };
        let Some(leaf_id) = self.meta.tag_id_by_name(&leaf).await? else {
            return Ok(None);
        };
        let ancestors = self.ancestor_ids(leaf_id).await?;
        for part in &parts {
            match self.meta.tag_id_by_name(part).await? {
                Some(id) if ancestors.contains(&id) => {}
                _ => return Ok(None),
            }
        }
        Ok(Some(leaf_id))
    }

    /// Whether a tag-view path names an existing tag (or the root).
    pub async fn tag_exists(&self, tag_or_path: &str) -> ModelResult<bool> {
        Ok(self.resolve_tag(tag_or_path).await?.is_some())
    }

    /// The tag a tag-view path's leaf sits under: the path minus its last
    /// component, the root when nothing remains.
    pub(crate) async fn parent_tag_of_path(&self, mounted: &str) -> ModelResult<Option<i64>> {
        let (parent, _) = path::split_parent(mounted);
        if parent.is_empty() {
            Ok(Some(TAG_ROOT_ID))
        } else {
            self.resolve_tag(parent).await
        }
    }

    /// Find a tagged file by name under a tag.
    pub(crate) async fn tagged_file_id(
        &self,
        tag_id: i64,
        name: &str,
    ) -> ModelResult<Option<i64>> {
        for file_id in self.meta.tagged_file_ids(tag_id).await? {
            if self.meta.file_name(file_id).await?.as_deref() == Some(name) {
                return Ok(Some(file_id));
            }
        }
        Ok(None)
    }

    /// Names of all files tagged with a tag.
    pub(crate) async fn tagged_file_names(&self, tag_id: i64) -> ModelResult<Vec<String>> {
        let mut names = Vec::new();
        for file_id in self.meta.tagged_file_ids(tag_id).await? {
            if let Some(name) = self.meta.file_name(file_id).await? {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Child-tag names followed by tagged-file names. Unknown paths list
    /// as empty, like missing folders in default mode.
    pub async fn list_tag_children(&self, tag_path: &str) -> ModelResult<Vec<String>> {
        let Some(tag_id) = self.resolve_tag(tag_path).await? else {
            return Ok(Vec::new());
        };
        let mut contents = Vec::new();
        for child in self.meta.child_ids(tag_id).await? {
            if let Some(name) = self.meta.tag_name(child).await? {
                contents.push(name);
            }
        }
        contents.extend(self.tagged_file_names(tag_id).await?);
        Ok(contents)
    }

    /// The real blob path behind a tag-view file path.
    pub async fn tagged_file_path(&self, mounted: &str) -> ModelResult<Option<PathBuf>> {
        let Some(parent) = self.parent_tag_of_path(mounted).await? else {
            return Ok(None);
        };
        let name = path::file_name(mounted);
        let Some(file_id) = self.tagged_file_id(parent, name).await? else {
            return Ok(None);
        };
        let Some(hash) = self.meta.file_hash(file_id).await? else {
            return Ok(None);
        };
        Ok(Some(self.blobs.blob_path(&hash)?))
    }

    /// Create a tag from a bare name or a tag-view path.
    ///
    /// Tag names are globally unique. In path form the nearest path
    /// component becomes the parent and must itself be a tag.
    pub async fn create_tag(&self, tag_or_path: &str) -> ModelResult<()> {
        let mut parts = path::components(tag_or_path);
        let name = if tag_or_path.contains('/') {
            parts.pop().unwrap_or_default()
        } else {
            tag_or_path.to_string()
        };
        if name.is_empty() {
            return Err(ModelError::NotFound(tag_or_path.to_string()));
        }
        if self.meta.tag_id_by_name(&name).await?.is_some() {
            return Err(ModelError::Exists(name));
        }

        let parent = match parts.last() {
            Some(parent_name) => self
                .meta
                .tag_id_by_name(parent_name)
                .await?
                .ok_or_else(|| ModelError::NotFound(parent_name.clone()))?,
            None => TAG_ROOT_ID,
        };

        let new_id = self.meta.insert_tag(&name, &[parent]).await?;
        let mut children = self.meta.child_ids(parent).await?;
        children.push(new_id);
        self.meta.set_child_ids(parent, &children).await?;
        Ok(())
    }

    /// Delete a tag. Refused while it still has tagged files or child
    /// tags; otherwise the tag is unlinked from each parent's child list
    /// and its row removed.
    pub async fn delete_tag(&self, tag_or_path: &str) -> ModelResult<()> {
        let tag_id = self
            .resolve_tag(tag_or_path)
            .await?
            .filter(|id| *id != TAG_ROOT_ID)
            .ok_or_else(|| ModelError::NotFound(tag_or_path.to_string()))?;

        if !self.meta.tagged_file_ids(tag_id).await?.is_empty()
            || !self.meta.child_ids(tag_id).await?.is_empty()
        {
            return Err(ModelError::NotEmpty(tag_or_path.to_string()));
        }

        for parent in self.meta.parent_ids(tag_id).await? {
            let children: Vec<i64> = self
                .meta
                .child_ids(parent)
                .await?
                .into_iter()
                .filter(|id| *id != tag_id)
                .collect();
            self.meta.set_child_ids(parent, &children).await?;
        }
        self.meta.delete_tag_row(tag_id).await?;
        Ok(())
    }

    /// Add one file to a tag's file set. Fails with *exists* when a file
    /// with the same name is already tagged.
    pub(crate) async fn tag_single_file(&self, file_id: i64, tag_id: i64) -> ModelResult<()> {
        let name = self
            .meta
            .file_name(file_id)
            .await?
            .ok_or_else(|| ModelError::NotFound(format!("file id {file_id}")))?;
        if self.tagged_file_names(tag_id).await?.contains(&name) {
            return Err(ModelError::Exists(name));
        }
        let mut ids = self.meta.tagged_file_ids(tag_id).await?;
        ids.push(file_id);
        self.meta.set_tagged_file_ids(tag_id, &ids).await?;
        Ok(())
    }

    /// Remove one file from a tag's file set.
    pub(crate) async fn untag_single_file(&self, file_id: i64, tag_id: i64) -> ModelResult<()> {
        let ids = self.meta.tagged_file_ids(tag_id).await?;
        if !ids.contains(&file_id) {
            return Err(ModelError::NotFound(format!("file id {file_id}")));
        }
        let remaining: Vec<i64> = ids.into_iter().filter(|id| *id != file_id).collect();
        self.meta.set_tagged_file_ids(tag_id, &remaining).await?;
        Ok(())
    }

    /// Tag a file, or every file directly inside a folder (non-recursive),
    /// creating the tag if it does not exist yet. Name conflicts inside a
    /// folder are accumulated rather than aborting the sweep.
    pub async fn tag_files(&self, mounted: &str, tag: &str) -> ModelResult<()> {
        let tag_id = match self.meta.tag_id_by_name(tag).await? {
            Some(id) => id,
            None => {
                self.create_tag(tag).await?;
                self.meta
                    .tag_id_by_name(tag)
                    .await?
                    .ok_or_else(|| ModelError::NotFound(tag.to_string()))?
            }
        };

        let (parent, name) = self.resolve_parent(mounted).await?;
        if let Some(row) = self.meta.get_file(&name, parent).await? {
            return self.tag_single_file(row.file_id, tag_id).await;
        }
        if let Some(folder) = self.meta.folder_id(&name, parent).await? {
            let mut conflict = false;
            for file_id in self.meta.file_ids_in_folder(folder).await? {
                match self.tag_single_file(file_id, tag_id).await {
                    Err(ModelError::Exists(_)) => conflict = true,
                    other => other?,
                }
            }
            return if conflict {
                Err(ModelError::Exists(mounted.to_string()))
            } else {
                Ok(())
            };
        }
        Err(ModelError::NotFound(mounted.to_string()))
    }

    /// Untag a file, or every file directly inside a folder
    /// (non-recursive). Files not carrying the tag are accumulated rather
    /// than aborting the sweep.
    pub async fn untag_files(&self, mounted: &str, tag: &str) -> ModelResult<()> {
        let tag_id = self
            .meta
            .tag_id_by_name(tag)
            .await?
            .ok_or_else(|| ModelError::NotFound(tag.to_string()))?;

        let (parent, name) = self.resolve_parent(mounted).await?;
        if let Some(row) = self.meta.get_file(&name, parent).await? {
            return self.untag_single_file(row.file_id, tag_id).await;
        }
        if let Some(folder) = self.meta.folder_id(&name, parent).await? {
            let mut missing = false;
            for file_id in self.meta.file_ids_in_folder(folder).await? {
                match self.untag_single_file(file_id, tag_id).await {
                    Err(ModelError::NotFound(_)) => missing = true,
                    other => other?,
                }
            }
            return if missing {
                Err(ModelError::NotFound(mounted.to_string()))
            } else {
                Ok(())
            };
        }
        Err(ModelError::NotFound(mounted.to_string()))
    }

    /// Nest a tag under a parent tag, by name or tag-view path.
    pub async fn nest_tag(&self, child: &str, parent: &str) -> ModelResult<()> {
        let child_id = self
            .resolve_tag(child)
            .await?
            .ok_or_else(|| ModelError::NotFound(child.to_string()))?;
        let parent_id = self
            .resolve_tag(parent)
            .await?
            .ok_or_else(|| ModelError::NotFound(parent.to_string()))?;
        self.nest_tag_ids(child_id, parent_id).await
    }

    /// Nest by id: reject duplicate edges, reject edges that would close a
    /// cycle, then record the edge on both sides of the index.
    pub(crate) async fn nest_tag_ids(&self, child_id: i64, parent_id: i64) -> ModelResult<()> {
        let mut children = self.meta.child_ids(parent_id).await?;
        let mut parents = self.meta.parent_ids(child_id).await?;
        if children.contains(&child_id) || parents.contains(&parent_id) {
            return Err(ModelError::Exists(format!(
                "tag {child_id} already nested under {parent_id}"
            )));
        }

        // Reachability check: the child must not be an ancestor of its
        // prospective parent.
        if self.ancestor_ids(parent_id).await?.contains(&child_id) {
            let child = self
                .meta
                .tag_name(child_id)
                .await?
                .unwrap_or_else(|| child_id.to_string());
            let parent = self
                .meta
                .tag_name(parent_id)
                .await?
                .unwrap_or_else(|| parent_id.to_string());
            return Err(ModelError::Cycle { child, parent });
        }

        children.push(child_id);
        parents.push(parent_id);
        self.meta.set_child_ids(parent_id, &children).await?;
        self.meta.set_parent_ids(child_id, &parents).await?;
        Ok(())
    }

    /// Remove a nesting edge, by name or tag-view path.
    pub async fn unnest_tag(&self, child: &str, parent: &str) -> ModelResult<()> {
        let child_id = self
            .resolve_tag(child)
            .await?
            .ok_or_else(|| ModelError::NotFound(child.to_string()))?;
        let parent_id = self
            .resolve_tag(parent)
            .await?
            .ok_or_else(|| ModelError::NotFound(parent.to_string()))?;
        self.unnest_tag_ids(child_id, parent_id).await
    }

    /// Remove the edge from both sides of the index.
    pub(crate) async fn unnest_tag_ids(&self, child_id: i64, parent_id: i64) -> ModelResult<()> {
        let children = self.meta.child_ids(parent_id).await?;
        let parents = self.meta.parent_ids(child_id).await?;
        if !children.contains(&child_id) || !parents.contains(&parent_id) {
            return Err(ModelError::NotFound(format!(
                "tag {child_id} not nested under {parent_id}"
            )));
        }
        let children: Vec<i64> = children.into_iter().filter(|id| *id != child_id).collect();
        let parents: Vec<i64> = parents.into_iter().filter(|id| *id != parent_id).collect();
        self.meta.set_child_ids(parent_id, &children).await?;
        self.meta.set_parent_ids(child_id, &parents).await?;
        Ok(())
    }

    /// Untag the file a tag-view path denotes (the tag-view unlink).
    pub async fn untag_by_tag_path(&self, mounted: &str) -> ModelResult<()> {
        let parent = self
            .parent_tag_of_path(mounted)
            .await?
            .ok_or_else(|| ModelError::NotFound(mounted.to_string()))?;
        let file_id = self
            .tagged_file_id(parent, path::file_name(mounted))
            .await?
            .ok_or_else(|| ModelError::NotFound(mounted.to_string()))?;
        self.untag_single_file(file_id, parent).await
    }

    /// Rename within the tag view.
    ///
    /// Two legal shapes: a tagged file moving between tags (leaf name
    /// unchanged, untag from the old parent and tag under the new), and a
    /// tag being renamed and/or moved (direct rename, unnest+nest on a
    /// parent change).
    pub async fn rename_tagged_path(&self, old: &str, new: &str) -> ModelResult<()> {
        let old_parent = self
            .parent_tag_of_path(old)
            .await?
            .ok_or_else(|| ModelError::NotFound(old.to_string()))?;
        let new_parent = self
            .parent_tag_of_path(new)
            .await?
            .ok_or_else(|| ModelError::NotFound(new.to_string()))?;

        let old_name = path::file_name(old);
        let new_name = path::file_name(new);
        let old_tag = self.meta.tag_id_by_name(old_name).await?;
        let new_tag = self.meta.tag_id_by_name(new_name).await?;
        let old_file = self.tagged_file_id(old_parent, old_name).await?;
        let new_file = self.tagged_file_id(new_parent, new_name).await?;

        if let Some(file_id) = old_file
            && new_tag.is_none()
            && new_file.is_none()
        {
            if old_name != new_name {
                return Err(ModelError::Unsupported(
                    "tagged files can only move between tags, not change name".to_string(),
                ));
            }
            self.untag_single_file(file_id, old_parent).await?;
            self.tag_single_file(file_id, new_parent).await?;
            Ok(())
        } else if let Some(tag_id) = old_tag
            && new_file.is_none()
        {
            if let Some(existing) = new_tag
                && existing != tag_id
            {
                return Err(ModelError::Exists(new_name.to_string()));
            }
            if new_parent != old_parent {
                self.unnest_tag_ids(tag_id, old_parent).await?;
                self.nest_tag_ids(tag_id, new_parent).await?;
            }
            if new_tag.is_none() {
                self.meta.set_tag_name(tag_id, new_name).await?;
            }
            Ok(())
        } else {
            Err(ModelError::NotFound(old.to_string()))
        }
    }

    /// Every tag carrying a file.
    pub async fn file_tags(&self, file_id: i64) -> ModelResult<Vec<String>> {
        let mut tags = Vec::new();
        for (_, name, file_ids) in self.meta.tags_with_files().await? {
            if file_ids.contains(&file_id) {
                tags.push(name);
            }
        }
        Ok(tags)
    }

    /// Tags of the file a default-mode path denotes.
    pub async fn file_tags_for_path(&self, mounted: &str) -> ModelResult<Vec<String>> {
        let (parent, name) = self.resolve_parent(mounted).await?;
        let row = self
            .meta
            .get_file(&name, parent)
            .await?
            .ok_or_else(|| ModelError::NotFound(mounted.to_string()))?;
        self.file_tags(row.file_id).await
    }

    /// Search tagged files. Strict mode intersects the file sets of all
    /// listed tags, non-strict unites them; an unknown tag name empties
    /// the result either way. Tag order never changes the outcome.
    pub async fn search_by_tags(&self, tags: &[String], strict: bool) -> ModelResult<Vec<String>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }

        let mut sets: Vec<BTreeSet<i64>> = Vec::with_capacity(tags.len());
        for tag in tags {
            let Some(tag_id) = self.meta.tag_id_by_name(tag).await? else {
                return Ok(Vec::new());
            };
            sets.push(self.meta.tagged_file_ids(tag_id).await?.into_iter().collect());
        }

        let mut matches = sets.remove(0);
        for set in sets {
            if strict {
                matches = matches.intersection(&set).copied().collect();
            } else {
                matches.extend(set);
            }
        }

        let mut names = Vec::new();
        for file_id in matches {
            if let Some(name) = self.meta.file_name(file_id).await? {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// File and tag counts for the stats command.
    pub async fn stats(&self) -> ModelResult<StoreStats> {
        Ok(StoreStats {
            files: self.meta.count_files().await?,
            tags: self.meta.count_tags().await?,
        })
    }
}
