//! Datagram client for talking to the daemon.

use anyhow::{Context, Result, bail};
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use tagfs_core::{Endpoints, FRAME_SIZE, Frame};
use tokio::net::UnixDatagram;
use tokio::time::timeout;

/// Budget for each leg of the health handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// One CLI invocation's connection to the daemon.
///
/// Binds the operator reply endpoint, then probes the daemon with a
/// bounded `OP_PING` handshake. `responding` distinguishes a live daemon
/// from stale sockets left by an unclean shutdown.
pub struct Client {
    endpoints: Endpoints,
    sock: Option<UnixDatagram>,
    /// The daemon's inbound endpoint exists on disk.
    pub sockets_exist: bool,
    /// The daemon answered the health handshake.
    pub responding: bool,
}

impl Client {
    /// Connect and probe.
    pub async fn connect(endpoints: Endpoints) -> Result<Self> {
        let sockets_exist = endpoints.daemon.exists();
        let mut client = Self {
            endpoints,
            sock: None,
            sockets_exist,
            responding: false,
        };
        if !sockets_exist {
            return Ok(client);
        }

        // A previous invocation may have left its reply endpoint behind;
        // the CLI is short-lived, so reclaim the path.
        let _ = std::fs::remove_file(&client.endpoints.operator);
        let sock = UnixDatagram::bind(&client.endpoints.operator)
            .with_context(|| format!("failed to bind {}", client.endpoints.operator.display()))?;
        std::fs::set_permissions(
            &client.endpoints.operator,
            std::fs::Permissions::from_mode(0o660),
        )?;
        client.sock = Some(sock);
        client.responding = client.probe().await;
        Ok(client)
    }

    /// Bounded send plus bounded receive; any timeout means unreachable.
    async fn probe(&self) -> bool {
        if self.send_bounded("OP_PING").await.is_err() {
            return false;
        }
        self.recv_bounded().await.is_ok()
    }

    async fn send_bounded(&self, request: &str) -> Result<()> {
        let sock = self.sock.as_ref().context("not connected")?;
        let frame = Frame::new(request)?;
        timeout(HANDSHAKE_TIMEOUT, sock.send_to(&frame.encode(), &self.endpoints.daemon))
            .await
            .context("send timed out")??;
        Ok(())
    }

    async fn recv_bounded(&self) -> Result<Frame> {
        let sock = self.sock.as_ref().context("not connected")?;
        let mut buf = [0u8; FRAME_SIZE];
        let (len, _) = timeout(HANDSHAKE_TIMEOUT, sock.recv_from(&mut buf))
            .await
            .context("receive timed out")??;
        Ok(Frame::decode(&buf[..len])?)
    }

    /// Send one request and accumulate the (possibly multi-part) response.
    pub async fn query(&self, request: &str) -> Result<Vec<String>> {
        if !self.responding {
            bail!("TagFS not running or unreachable");
        }
        let sock = self.sock.as_ref().context("not connected")?;
        let frame = Frame::new(request)?;
        sock.send_to(&frame.encode(), &self.endpoints.daemon)
            .await
            .context("failed to send request")?;

        let mut parts = Vec::new();
        loop {
            let mut buf = [0u8; FRAME_SIZE];
            let (len, _) = sock
                .recv_from(&mut buf)
                .await
                .context("failed to receive response")?;
            let frame = Frame::decode(&buf[..len])?;
            let is_final = frame.is_final;
            parts.push(frame.payload);
            if is_final {
                return Ok(parts);
            }
        }
    }

    /// Send a request that expects no reply (the shutdown verb).
    pub async fn send_oneway(&self, request: &str) -> Result<()> {
        self.send_bounded(request).await
    }

    /// Remove every endpoint path, for cleaning up after an unresponsive
    /// daemon.
    pub fn remove_stale_endpoints(&self) {
        for path in [
            &self.endpoints.daemon,
            &self.endpoints.bridge,
            &self.endpoints.operator,
        ] {
            let _ = std::fs::remove_file(path);
        }
    }
}
