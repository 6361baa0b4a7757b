//! Fixed-size wire frames.
//!
//! Every message between the daemon, the filesystem bridge and the operator
//! CLI is one datagram of exactly [`FRAME_SIZE`] bytes: a one-byte
//! final/continuation flag followed by a NUL-terminated payload. Multi-part
//! responses (directory listings, search results) are sequences of frames
//! whose last element carries the final flag.

use crate::error::{Error, Result};

/// Size of one wire frame in bytes.
pub const FRAME_SIZE: usize = 6144;

/// Maximum payload length: the flag byte and the NUL terminator are reserved.
pub const MAX_PAYLOAD: usize = FRAME_SIZE - 2;

/// Flag value marking the last frame of a response.
const FLAG_FINAL: u8 = 1;

/// One framed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Whether this frame completes the message.
    pub is_final: bool,
    /// The payload text.
    pub payload: String,
}

impl Frame {
    /// Build a final frame.
    pub fn new(payload: impl Into<String>) -> Result<Self> {
        Self::with_flag(payload, true)
    }

    /// Build a continuation frame (more frames follow).
    pub fn continuation(payload: impl Into<String>) -> Result<Self> {
        Self::with_flag(payload, false)
    }

    fn with_flag(payload: impl Into<String>, is_final: bool) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD {
            return Err(Error::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD,
            });
        }
        if payload.as_bytes().contains(&0) {
            return Err(Error::InvalidFrame("payload contains NUL".to_string()));
        }
        Ok(Self { is_final, payload })
    }

    /// Encode into a wire buffer.
    pub fn encode(&self) -> [u8; FRAME_SIZE] {
        let mut buf = [0u8; FRAME_SIZE];
        buf[0] = if self.is_final { FLAG_FINAL } else { 0 };
        buf[1..1 + self.payload.len()].copy_from_slice(self.payload.as_bytes());
        buf
    }

    /// Decode from a received datagram.
    ///
    /// The datagram must be exactly [`FRAME_SIZE`] bytes; the payload runs
    /// from byte 1 to the first NUL.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() != FRAME_SIZE {
            return Err(Error::InvalidFrame(format!(
                "expected {FRAME_SIZE} bytes, got {}",
                buf.len()
            )));
        }
        let body = &buf[1..];
        let end = body
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::InvalidFrame("missing NUL terminator".to_string()))?;
        let payload = std::str::from_utf8(&body[..end])
            .map_err(|e| Error::InvalidFrame(e.to_string()))?
            .to_string();
        Ok(Self {
            is_final: buf[0] == FLAG_FINAL,
            payload,
        })
    }
}
