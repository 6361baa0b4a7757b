//! Metadata store for TagFS.
//!
//! This crate owns the two-table data model behind the filesystem:
//! - `files`: one row per user-visible file, named by content hash
//! - `tags`: folders, tags and the two reserved roots, discriminated by
//!   `parent_folder`, with serialized edge lists for the tag-nesting DAG
//!
//! The store runs entirely in memory and is bulk-copied from and to a
//! backing file at startup and shutdown. All access goes through a closed
//! catalogue of parameterised statements; no user-supplied text is ever
//! concatenated into SQL.

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use repos::{FileRepo, TagRepo};
pub use store::SqliteStore;

/// Reserved sentinel root of the tag-view graph.
pub const TAG_ROOT_ID: i64 = 0;

/// Reserved root folder of the default-mode tree.
pub const FOLDER_ROOT_ID: i64 = 1;

/// `parent_folder` marker for tag rows.
pub const TAG_PARENT: i64 = 0;

/// `parent_folder` marker for the two reserved roots.
pub const ROOT_PARENT: i64 = -1;
