//! Content-addressed blob directory for TagFS.
//!
//! The storage root holds exactly one file per unique content hash, named
//! by the uppercase hex digest (plus transient `.WRITE` / `.TRUNCATE`
//! shadows during controlled write windows, and placeholder-named empty
//! blobs for files awaiting their first write).

pub mod error;
pub mod store;

pub use error::{BlobError, BlobResult};
pub use store::BlobStore;
