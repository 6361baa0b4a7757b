//! TagFS daemon library.
//!
//! Hosts the filesystem model (folder and tag semantics over the metadata
//! store and blob directory) and the serial request dispatcher that serves
//! the filesystem bridge and the operator CLI over the shared datagram
//! endpoints.

pub mod dispatch;
pub mod model;
pub mod transport;

pub use dispatch::Dispatcher;
pub use model::{FsModel, ModelError, ModelResult};
pub use transport::{DaemonTransport, TransportError};
