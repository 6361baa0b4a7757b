//! Database models mapping to the metadata schema.
//!
//! Tag rows have no struct here: [`crate::repos::TagRepo`] reads and
//! writes them as scalars and serialized edge lists, never whole rows.

use sqlx::FromRow;

/// File record: one user-visible file.
#[derive(Debug, Clone, FromRow)]
pub struct FileRow {
    pub file_id: i64,
    /// User-visible filename, no path separators.
    pub name: String,
    /// Uppercase-hex content digest, or a placeholder token while
    /// `is_placeholder` is set.
    pub hash: String,
    /// Folder containing this file in the default-mode tree.
    pub parent_folder: i64,
    /// Set between creation and the first write-release cycle.
    pub is_placeholder: bool,
}

/// Aggregate counts reported by the stats command.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreStats {
    /// Number of file rows.
    pub files: u64,
    /// Number of tag rows (folders and roots excluded).
    pub tags: u64,
}
