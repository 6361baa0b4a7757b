//! Core domain types and shared logic for TagFS.
//!
//! This crate defines the vocabulary used across all other crates:
//! - Content hashes naming blobs in the storage root
//! - Fixed-size wire frames for the request/response transport
//! - Mounted-path decomposition and filename helpers
//! - Semicolon-delimited id lists as stored in the tag table
//! - Daemon configuration and the shared endpoint naming scheme

pub mod config;
pub mod error;
pub mod frame;
pub mod hash;
pub mod idlist;
pub mod path;
pub mod placeholder;

pub use config::{DaemonConfig, Endpoints};
pub use error::{Error, Result};
pub use frame::{FRAME_SIZE, Frame, MAX_PAYLOAD};
pub use hash::ContentHash;

/// Suffix of the shadow copy a writer fills before release promotes it.
pub const WRITE_SHADOW_SUFFIX: &str = ".WRITE";

/// Suffix of the shadow copy used to truncate a shared blob.
pub const TRUNCATE_SHADOW_SUFFIX: &str = ".TRUNCATE";
