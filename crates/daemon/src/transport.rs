//! Datagram transport endpoints.
//!
//! Three named Unix datagram sockets under a shared runtime directory:
//! the daemon binds its inbound endpoint, and the bridge and operator CLI
//! each bind their own reply endpoint under the same naming scheme. The
//! daemon addresses replies at whichever endpoint belongs to the verb's
//! namespace.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tagfs_core::{Endpoints, FRAME_SIZE, Frame};
use thiserror::Error;
use tokio::net::UnixDatagram;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Frame(#[from] tagfs_core::Error),
}

/// Result type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Socket permissions: owner plus group read/write.
const SOCKET_MODE: u32 = 0o660;

/// The daemon's side of the transport.
pub struct DaemonTransport {
    endpoints: Endpoints,
    sock: UnixDatagram,
}

impl DaemonTransport {
    /// Bind the daemon's inbound endpoint.
    ///
    /// Fails when the socket path already exists, which means another
    /// daemon is running or a previous one did not shut down cleanly.
    pub fn bind(endpoints: Endpoints) -> TransportResult<Self> {
        let sock = UnixDatagram::bind(&endpoints.daemon)?;
        std::fs::set_permissions(
            &endpoints.daemon,
            std::fs::Permissions::from_mode(SOCKET_MODE),
        )?;
        Ok(Self { endpoints, sock })
    }

    /// Block on the next request frame.
    pub async fn recv(&self) -> TransportResult<Frame> {
        let mut buf = [0u8; FRAME_SIZE];
        let (len, _) = self.sock.recv_from(&mut buf).await?;
        Ok(Frame::decode(&buf[..len])?)
    }

    async fn send_to(&self, dest: &Path, frame: &Frame) -> TransportResult<()> {
        self.sock.send_to(&frame.encode(), dest).await?;
        Ok(())
    }

    /// Send one final reply frame to the bridge.
    pub async fn reply_bridge(&self, payload: &str) -> TransportResult<()> {
        self.send_to(&self.endpoints.bridge, &Frame::new(payload)?)
            .await
    }

    /// Send one final reply frame to the operator CLI.
    pub async fn reply_operator(&self, payload: &str) -> TransportResult<()> {
        self.send_to(&self.endpoints.operator, &Frame::new(payload)?)
            .await
    }

    /// Send a multi-part reply to the bridge.
    pub async fn reply_bridge_parts(&self, parts: &[String]) -> TransportResult<()> {
        self.send_parts(&self.endpoints.bridge, parts).await
    }

    /// Send a multi-part reply to the operator CLI.
    pub async fn reply_operator_parts(&self, parts: &[String]) -> TransportResult<()> {
        self.send_parts(&self.endpoints.operator, parts).await
    }

    /// Emit one frame per part with the continuation flag, the last frame
    /// final. An empty result is a single empty final frame so the reader
    /// always gets a terminator.
    async fn send_parts(&self, dest: &Path, parts: &[String]) -> TransportResult<()> {
        if parts.is_empty() {
            return self.send_to(dest, &Frame::new("")?).await;
        }
        for (index, part) in parts.iter().enumerate() {
            let is_last = index == parts.len() - 1;
            let frame = if is_last {
                Frame::new(part.as_str())?
            } else {
                Frame::continuation(part.as_str())?
            };
            self.send_to(dest, &frame).await?;
        }
        Ok(())
    }

    /// Remove all three socket paths. Stale peer endpoints from crashed
    /// clients are cleaned up alongside our own.
    pub fn unlink_all(&self) {
        for path in [
            &self.endpoints.daemon,
            &self.endpoints.bridge,
            &self.endpoints.operator,
        ] {
            if let Err(e) = std::fs::remove_file(path)
                && e.kind() != std::io::ErrorKind::NotFound
            {
                tracing::warn!(path = %path.display(), error = %e, "failed to unlink endpoint");
            }
        }
    }
}
