//! SQLite-backed metadata store.
//!
//! The live database is in-memory: it is populated from the backing file at
//! startup and bulk-copied back at shutdown. Failures in either direction
//! are fatal to the daemon, which is why both surface as hard errors here
//! rather than degraded modes.

use crate::error::{MetadataError, MetadataResult};
use crate::{FOLDER_ROOT_ID, TAG_ROOT_ID};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;

/// Schema DDL, emitted verbatim on first initialisation only. Thereafter
/// the backing file's schema must compare equal to this one.
const CREATE_TAGS_SQL: &str = "CREATE TABLE tags ( \
     tag_id INTEGER PRIMARY KEY AUTOINCREMENT, \
     tag_name TEXT NOT NULL, \
     parent_folder INTEGER NOT NULL, \
     parent_tags TEXT, \
     child_tags TEXT, \
     files_ids TEXT )";

const CREATE_FILES_SQL: &str = "CREATE TABLE files ( \
     file_id INTEGER PRIMARY KEY AUTOINCREMENT, \
     name TEXT NOT NULL, \
     hash TEXT NOT NULL, \
     parent_folder INTEGER NOT NULL, \
     is_placeholder INTEGER NOT NULL DEFAULT 0 )";

/// Name of the reserved tag-graph root row. Contains separators so no
/// user-created tag can ever collide with it.
const TAG_ROOT_NAME: &str = "//tags//";

/// Name of the reserved root folder row.
const FOLDER_ROOT_NAME: &str = "/";

/// SQLite-based metadata store over an in-memory database.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open the in-memory store.
    ///
    /// If `backing` exists its contents are bulk-copied in after a schema
    /// equality check; otherwise the schema is created fresh and the two
    /// reserved root rows are inserted.
    pub async fn open(backing: impl AsRef<Path>) -> MetadataResult<Self> {
        let backing = backing.as_ref();

        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // One connection, kept alive forever: the in-memory database lives
        // and dies with this connection.
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.create_schema().await?;

        if backing.exists() {
            store.load_from(backing).await?;
            tracing::info!(backing = %backing.display(), "metadata loaded from backing file");
        } else {
            store.insert_roots().await?;
            tracing::info!(backing = %backing.display(), "metadata initialised fresh");
        }

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    async fn create_schema(&self) -> MetadataResult<()> {
        sqlx::query(CREATE_TAGS_SQL).execute(&self.pool).await?;
        sqlx::query(CREATE_FILES_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_roots(&self) -> MetadataResult<()> {
        sqlx::query(
            "INSERT INTO tags ( tag_id, tag_name, parent_folder, parent_tags, child_tags, files_ids ) \
             VALUES ( ?, ?, -1, '', '', '' )",
        )
        .bind(TAG_ROOT_ID)
        .bind(TAG_ROOT_NAME)
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "INSERT INTO tags ( tag_id, tag_name, parent_folder, parent_tags, child_tags, files_ids ) \
             VALUES ( ?, ?, -1, '', '', '' )",
        )
        .bind(FOLDER_ROOT_ID)
        .bind(FOLDER_ROOT_NAME)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Bulk-copy the backing database into memory.
    async fn load_from(&self, backing: &Path) -> MetadataResult<()> {
        let backing_str = backing.to_string_lossy().into_owned();
        sqlx::query("ATTACH DATABASE ? AS backing")
            .bind(&backing_str)
            .execute(&self.pool)
            .await?;

        let copy = async {
            self.verify_backing_schema().await?;
            sqlx::query(
                "INSERT INTO main.tags \
                 SELECT tag_id, tag_name, parent_folder, parent_tags, child_tags, files_ids \
                 FROM backing.tags",
            )
            .execute(&self.pool)
            .await?;
            sqlx::query(
                "INSERT INTO main.files \
                 SELECT file_id, name, hash, parent_folder, is_placeholder \
                 FROM backing.files",
            )
            .execute(&self.pool)
            .await?;
            Ok::<(), MetadataError>(())
        }
        .await;

        sqlx::query("DETACH DATABASE backing")
            .execute(&self.pool)
            .await?;
        copy
    }

    /// The backing file's table DDL must compare equal to ours.
    async fn verify_backing_schema(&self) -> MetadataResult<()> {
        let ours = self.table_ddl("main").await?;
        let theirs = self.table_ddl("backing").await?;
        if ours != theirs {
            return Err(MetadataError::SchemaMismatch(format!(
                "expected {ours:?}, found {theirs:?}"
            )));
        }
        Ok(())
    }

    async fn table_ddl(&self, schema: &str) -> MetadataResult<Vec<(String, String)>> {
        // Schema names cannot be bound parameters; both callers pass
        // compile-time constants.
        let sql = format!(
            "SELECT name, sql FROM {schema}.sqlite_master \
             WHERE type = 'table' AND name IN ('tags', 'files') ORDER BY name"
        );
        let rows: Vec<(String, String)> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    /// Bulk-copy the in-memory database back to the backing file.
    ///
    /// Writes to a temporary sibling and renames into place so a failed
    /// save never truncates the previous backing file.
    pub async fn save(&self, backing: impl AsRef<Path>) -> MetadataResult<()> {
        let backing = backing.as_ref();
        let mut tmp_name = backing.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp_name);

        if tokio::fs::try_exists(&tmp).await? {
            tokio::fs::remove_file(&tmp).await?;
        }

        sqlx::query("VACUUM INTO ?")
            .bind(tmp.to_string_lossy().into_owned())
            .execute(&self.pool)
            .await?;
        tokio::fs::rename(&tmp, backing).await?;
        tracing::info!(backing = %backing.display(), "metadata saved to backing file");
        Ok(())
    }
}

mod sqlite_impl {
    use super::*;
    use crate::TAG_PARENT;
    use crate::models::FileRow;
    use crate::repos::{FileRepo, TagRepo};
    use async_trait::async_trait;
    use tagfs_core::idlist;

    #[async_trait]
    impl FileRepo for SqliteStore {
        async fn get_file(
            &self,
            name: &str,
            parent_folder: i64,
        ) -> MetadataResult<Option<FileRow>> {
            let row = sqlx::query_as::<_, FileRow>(
                "SELECT * FROM files WHERE name = ? AND parent_folder = ?",
            )
            .bind(name)
            .bind(parent_folder)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn file_name(&self, file_id: i64) -> MetadataResult<Option<String>> {
            let name = sqlx::query_scalar("SELECT name FROM files WHERE file_id = ?")
                .bind(file_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(name)
        }

        async fn file_hash(&self, file_id: i64) -> MetadataResult<Option<String>> {
            let hash = sqlx::query_scalar("SELECT hash FROM files WHERE file_id = ?")
                .bind(file_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(hash)
        }

        async fn file_ids_in_folder(&self, folder_id: i64) -> MetadataResult<Vec<i64>> {
            let ids = sqlx::query_scalar("SELECT file_id FROM files WHERE parent_folder = ?")
                .bind(folder_id)
                .fetch_all(&self.pool)
                .await?;
            Ok(ids)
        }

        async fn file_names_in_folder(&self, folder_id: i64) -> MetadataResult<Vec<String>> {
            let names = sqlx::query_scalar("SELECT name FROM files WHERE parent_folder = ?")
                .bind(folder_id)
                .fetch_all(&self.pool)
                .await?;
            Ok(names)
        }

        async fn folder_has_files(&self, folder_id: i64) -> MetadataResult<bool> {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM files WHERE parent_folder = ?)")
                    .bind(folder_id)
                    .fetch_one(&self.pool)
                    .await?;
            Ok(exists)
        }

        async fn insert_placeholder(
            &self,
            name: &str,
            token: &str,
            parent_folder: i64,
        ) -> MetadataResult<i64> {
            let result = sqlx::query(
                "INSERT INTO files ( name, hash, parent_folder, is_placeholder ) \
                 VALUES ( ?, ?, ?, 1 )",
            )
            .bind(name)
            .bind(token)
            .bind(parent_folder)
            .execute(&self.pool)
            .await?;
            Ok(result.last_insert_rowid())
        }

        async fn set_hash(&self, file_id: i64, hash: &str) -> MetadataResult<()> {
            sqlx::query("UPDATE files SET hash = ?, is_placeholder = 0 WHERE file_id = ?")
                .bind(hash)
                .bind(file_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        async fn rename_file(
            &self,
            file_id: i64,
            new_name: &str,
            new_parent_folder: i64,
        ) -> MetadataResult<()> {
            sqlx::query("UPDATE files SET name = ?, parent_folder = ? WHERE file_id = ?")
                .bind(new_name)
                .bind(new_parent_folder)
                .bind(file_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        async fn delete_file_row(&self, file_id: i64) -> MetadataResult<()> {
            sqlx::query("DELETE FROM files WHERE file_id = ?")
                .bind(file_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        async fn hash_in_use(&self, hash: &str) -> MetadataResult<bool> {
            let in_use: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM files WHERE hash = ? AND is_placeholder = 0)",
            )
            .bind(hash)
            .fetch_one(&self.pool)
            .await?;
            Ok(in_use)
        }

        async fn hash_shared(&self, hash: &str) -> MetadataResult<bool> {
            let shared: bool = sqlx::query_scalar(
                "SELECT COUNT(*) > 1 FROM files WHERE hash = ? AND is_placeholder = 0",
            )
            .bind(hash)
            .fetch_one(&self.pool)
            .await?;
            Ok(shared)
        }

        async fn count_files(&self) -> MetadataResult<u64> {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
                .fetch_one(&self.pool)
                .await?;
            Ok(count as u64)
        }

        async fn placeholder_hashes(&self) -> MetadataResult<Vec<String>> {
            let hashes = sqlx::query_scalar("SELECT hash FROM files WHERE is_placeholder = 1")
                .fetch_all(&self.pool)
                .await?;
            Ok(hashes)
        }
    }

    #[async_trait]
    impl TagRepo for SqliteStore {
        async fn folder_id(&self, name: &str, parent_folder: i64) -> MetadataResult<Option<i64>> {
            let id = sqlx::query_scalar(
                "SELECT tag_id FROM tags WHERE tag_name = ? AND parent_folder = ?",
            )
            .bind(name)
            .bind(parent_folder)
            .fetch_optional(&self.pool)
            .await?;
            Ok(id)
        }

        async fn subfolder_names(&self, folder_id: i64) -> MetadataResult<Vec<String>> {
            let names = sqlx::query_scalar("SELECT tag_name FROM tags WHERE parent_folder = ?")
                .bind(folder_id)
                .fetch_all(&self.pool)
                .await?;
            Ok(names)
        }

        async fn insert_folder(&self, name: &str, parent_folder: i64) -> MetadataResult<()> {
            sqlx::query("INSERT INTO tags ( tag_name, parent_folder ) VALUES ( ?, ? )")
                .bind(name)
                .bind(parent_folder)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        async fn rename_folder(
            &self,
            folder_id: i64,
            new_name: &str,
            new_parent_folder: i64,
        ) -> MetadataResult<()> {
            sqlx::query("UPDATE tags SET tag_name = ?, parent_folder = ? WHERE tag_id = ?")
                .bind(new_name)
                .bind(new_parent_folder)
                .bind(folder_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        async fn tag_id_by_name(&self, name: &str) -> MetadataResult<Option<i64>> {
            let id = sqlx::query_scalar(
                "SELECT tag_id FROM tags WHERE tag_name = ? AND parent_folder = ?",
            )
            .bind(name)
            .bind(TAG_PARENT)
            .fetch_optional(&self.pool)
            .await?;
            Ok(id)
        }

        async fn tag_name(&self, tag_id: i64) -> MetadataResult<Option<String>> {
            let name = sqlx::query_scalar("SELECT tag_name FROM tags WHERE tag_id = ?")
                .bind(tag_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(name)
        }

        async fn parent_ids(&self, tag_id: i64) -> MetadataResult<Vec<i64>> {
            let serialized: Option<String> =
                sqlx::query_scalar("SELECT parent_tags FROM tags WHERE tag_id = ?")
                    .bind(tag_id)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(idlist::split_ids(&serialized.unwrap_or_default()))
        }

        async fn child_ids(&self, tag_id: i64) -> MetadataResult<Vec<i64>> {
            let serialized: Option<String> =
                sqlx::query_scalar("SELECT child_tags FROM tags WHERE tag_id = ?")
                    .bind(tag_id)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(idlist::split_ids(&serialized.unwrap_or_default()))
        }

        async fn tagged_file_ids(&self, tag_id: i64) -> MetadataResult<Vec<i64>> {
            let serialized: Option<String> =
                sqlx::query_scalar("SELECT files_ids FROM tags WHERE tag_id = ?")
                    .bind(tag_id)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(idlist::split_ids(&serialized.unwrap_or_default()))
        }

        async fn set_parent_ids(&self, tag_id: i64, parent_ids: &[i64]) -> MetadataResult<()> {
            sqlx::query("UPDATE tags SET parent_tags = ? WHERE tag_id = ?")
                .bind(idlist::join(parent_ids))
                .bind(tag_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        async fn set_child_ids(&self, tag_id: i64, child_ids: &[i64]) -> MetadataResult<()> {
            sqlx::query("UPDATE tags SET child_tags = ? WHERE tag_id = ?")
                .bind(idlist::join(child_ids))
                .bind(tag_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        async fn set_tagged_file_ids(&self, tag_id: i64, file_ids: &[i64]) -> MetadataResult<()> {
            sqlx::query("UPDATE tags SET files_ids = ? WHERE tag_id = ?")
                .bind(idlist::join(file_ids))
                .bind(tag_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        async fn insert_tag(&self, name: &str, parent_ids: &[i64]) -> MetadataResult<i64> {
            let result = sqlx::query(
                "INSERT INTO tags ( tag_name, parent_folder, parent_tags, child_tags, files_ids ) \
                 VALUES ( ?, ?, ?, '', '' )",
            )
            .bind(name)
            .bind(TAG_PARENT)
            .bind(idlist::join(parent_ids))
            .execute(&self.pool)
            .await?;
            Ok(result.last_insert_rowid())
        }

        async fn set_tag_name(&self, tag_id: i64, new_name: &str) -> MetadataResult<()> {
            sqlx::query("UPDATE tags SET tag_name = ? WHERE tag_id = ?")
                .bind(new_name)
                .bind(tag_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        async fn delete_tag_row(&self, tag_id: i64) -> MetadataResult<()> {
            sqlx::query("DELETE FROM tags WHERE tag_id = ?")
                .bind(tag_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        async fn count_tags(&self) -> MetadataResult<u64> {
            let count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM tags WHERE parent_folder = ?")
                    .bind(TAG_PARENT)
                    .fetch_one(&self.pool)
                    .await?;
            Ok(count as u64)
        }

        async fn tags_with_files(&self) -> MetadataResult<Vec<(i64, String, Vec<i64>)>> {
            let rows: Vec<(i64, String, String)> = sqlx::query_as(
                "SELECT tag_id, tag_name, files_ids FROM tags WHERE parent_folder = ?",
            )
            .bind(TAG_PARENT)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows
                .into_iter()
                .map(|(id, name, files)| (id, name, idlist::split_ids(&files)))
                .collect())
        }
    }
}
