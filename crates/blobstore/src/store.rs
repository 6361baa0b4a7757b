//! The blob directory and its maintenance operations.

use crate::error::{BlobError, BlobResult};
use std::path::{Path, PathBuf};
use tagfs_core::{ContentHash, TRUNCATE_SHADOW_SUFFIX, WRITE_SHADOW_SUFFIX};
use tokio::fs;
use tokio::io::AsyncReadExt;

/// Read buffer size for streaming hashes.
const HASH_BUF_SIZE: usize = 64 * 1024;

/// A directory holding one blob per unique content hash.
///
/// The daemon owns this directory exclusively while mounted; the bridge
/// only ever opens paths handed out by the daemon.
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Open the blob directory, creating it if needed.
    pub async fn new(root: impl AsRef<Path>) -> BlobResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Path of the blob for a hash or placeholder token.
    ///
    /// Names are always daemon-generated (hex digests or placeholder
    /// tokens); anything with a path separator is rejected outright.
    pub fn blob_path(&self, name: &str) -> BlobResult<PathBuf> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(BlobError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    /// Path of the `.WRITE` shadow the bridge fills during a write window.
    pub fn write_shadow_path(&self, name: &str) -> BlobResult<PathBuf> {
        let mut path = self.blob_path(name)?.into_os_string();
        path.push(WRITE_SHADOW_SUFFIX);
        Ok(PathBuf::from(path))
    }

    /// Path of the `.TRUNCATE` shadow used to diverge a shared blob.
    pub fn truncate_shadow_path(&self, name: &str) -> BlobResult<PathBuf> {
        let mut path = self.blob_path(name)?.into_os_string();
        path.push(TRUNCATE_SHADOW_SUFFIX);
        Ok(PathBuf::from(path))
    }

    /// Streaming SHA-256 of a file, as stored in the metadata rows.
    pub async fn hash_file(&self, path: &Path) -> BlobResult<ContentHash> {
        let mut file = fs::File::open(path).await?;
        let mut hasher = ContentHash::hasher();
        let mut buf = vec![0u8; HASH_BUF_SIZE];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hasher.finalize())
    }

    /// Copy a blob to its `.TRUNCATE` shadow and return the shadow path.
    pub async fn copy_to_truncate_shadow(&self, name: &str) -> BlobResult<PathBuf> {
        let source = self.blob_path(name)?;
        let shadow = self.truncate_shadow_path(name)?;
        fs::copy(&source, &shadow).await?;
        Ok(shadow)
    }

    /// Truncate a file in place to the given length.
    pub async fn truncate(&self, path: &Path, len: u64) -> BlobResult<()> {
        let file = fs::OpenOptions::new().write(true).open(path).await?;
        file.set_len(len).await?;
        Ok(())
    }

    /// Move a finished file into place under its content hash.
    pub async fn promote(&self, from: &Path, hash: &ContentHash) -> BlobResult<PathBuf> {
        let dest = self.blob_path(&hash.to_hex())?;
        fs::rename(from, &dest).await?;
        Ok(dest)
    }

    /// Remove a file, tolerating it already being gone.
    pub async fn remove(&self, path: &Path) -> BlobResult<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether a file exists.
    pub async fn exists(&self, path: &Path) -> BlobResult<bool> {
        Ok(fs::try_exists(path).await?)
    }

    /// Create an empty file (used for placeholder blobs in tests and by
    /// the bridge for freshly created files).
    pub async fn create_empty(&self, path: &Path) -> BlobResult<()> {
        fs::File::create(path).await?;
        Ok(())
    }
}
