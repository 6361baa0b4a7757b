//! Common test fixtures.

use std::path::{Path, PathBuf};
use tagfs_blobstore::BlobStore;
use tagfs_daemon::FsModel;
use tagfs_metadata::SqliteStore;

/// Build a model over a scratch storage root.
#[allow(dead_code)]
pub async fn model_at(root: &Path) -> FsModel {
    tokio::fs::create_dir_all(root.join("metadata")).await.unwrap();
    let meta = SqliteStore::open(root.join("metadata").join("fs.db"))
        .await
        .unwrap();
    let blobs = BlobStore::new(root).await.unwrap();
    FsModel::new(meta, blobs).await.unwrap()
}

/// What the bridge does on create: ask for a placeholder, then create the
/// empty file at the returned path.
#[allow(dead_code)]
pub async fn bridge_create(model: &mut FsModel, mounted: &str) -> PathBuf {
    let placeholder = model.create_file(mounted).await.unwrap();
    model.blobs().create_empty(&placeholder).await.unwrap();
    placeholder
}

/// What the bridge does on write + release: fill the `.WRITE` shadow of
/// the current blob, then send the release.
#[allow(dead_code)]
pub async fn bridge_write(model: &FsModel, mounted: &str, contents: &[u8]) {
    let blob = model
        .file_path(mounted)
        .await
        .unwrap()
        .expect("file must exist before writing");
    let mut shadow = blob.into_os_string();
    shadow.push(".WRITE");
    tokio::fs::write(PathBuf::from(shadow), contents).await.unwrap();
    model.update_file(mounted).await.unwrap();
}

/// Read a mounted file's bytes through the model, like the bridge's open
/// and read path.
#[allow(dead_code)]
pub async fn bridge_read(model: &FsModel, mounted: &str) -> Vec<u8> {
    let blob = model
        .file_path(mounted)
        .await
        .unwrap()
        .expect("file must exist");
    tokio::fs::read(blob).await.unwrap()
}

/// Number of blobs in the storage root (the `metadata/` directory is not
/// a blob).
#[allow(dead_code)]
pub fn blob_count(root: &Path) -> usize {
    std::fs::read_dir(root)
        .unwrap()
        .filter(|entry| entry.as_ref().unwrap().file_type().unwrap().is_file())
        .count()
}
