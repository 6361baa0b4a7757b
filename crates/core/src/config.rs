//! Daemon configuration and the shared endpoint naming scheme.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for one daemon instance.
///
/// The operator CLI canonicalizes both directories before spawning the
/// daemon, so these are always absolute.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Where the filesystem bridge mounts.
    pub mount_point: PathBuf,
    /// Storage root holding one blob per content hash plus `metadata/`.
    pub root: PathBuf,
    /// Write a log file under `metadata/` instead of logging to stderr.
    pub enable_logging: bool,
    /// Present the tag graph instead of the folder tree.
    pub tag_view: bool,
}

impl DaemonConfig {
    /// Directory holding the database and log file.
    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join("metadata")
    }

    /// Path of the backing database file.
    pub fn db_path(&self) -> PathBuf {
        self.metadata_dir().join("fs.db")
    }

    /// Path of the log file used when logging is enabled.
    pub fn log_path(&self) -> PathBuf {
        self.metadata_dir().join("log.txt")
    }
}

/// The three named transport endpoints shared by daemon, bridge and CLI.
///
/// All three processes derive the same socket paths from the same runtime
/// directory, so a name change here is a protocol change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    /// Where the daemon receives requests.
    pub daemon: PathBuf,
    /// Where the filesystem bridge receives replies.
    pub bridge: PathBuf,
    /// Where the operator CLI receives replies.
    pub operator: PathBuf,
}

impl Endpoints {
    /// Derive the endpoint paths inside a runtime directory.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            daemon: dir.join("tagfs-daemon.sock"),
            bridge: dir.join("tagfs-bridge.sock"),
            operator: dir.join("tagfs-operator.sock"),
        }
    }

    /// The runtime directory every process agrees on by default:
    /// `$XDG_RUNTIME_DIR`, falling back to `/tmp`.
    pub fn default_runtime_dir() -> PathBuf {
        std::env::var_os("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/tmp"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_paths_live_under_root() {
        let config = DaemonConfig {
            mount_point: PathBuf::from("/mnt/tags"),
            root: PathBuf::from("/srv/tagfs"),
            enable_logging: true,
            tag_view: false,
        };
        assert_eq!(config.db_path(), PathBuf::from("/srv/tagfs/metadata/fs.db"));
        assert_eq!(
            config.log_path(),
            PathBuf::from("/srv/tagfs/metadata/log.txt")
        );
    }

    #[test]
    fn endpoints_share_the_directory() {
        let endpoints = Endpoints::in_dir("/run/user/1000");
        assert_eq!(
            endpoints.daemon,
            PathBuf::from("/run/user/1000/tagfs-daemon.sock")
        );
        assert_eq!(
            endpoints.operator,
            PathBuf::from("/run/user/1000/tagfs-operator.sock")
        );
    }
}
