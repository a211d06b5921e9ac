//! Binary frames between the bridge and its network clients
//!
//! Layout: `[frame_type:1][pane_id][b':'][payload]`. The pane id is non-empty
//! UTF-8 and never contains `:`, so the first colon after the type byte ends
//! it.
//!
//! Snapshots have their own frame type. Streamed output that happens to
//! start with a clear-screen sequence stays a plain data frame.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

/// Prefix of a snapshot payload: cursor home, clear screen
pub const SNAPSHOT_PREFIX: &[u8] = b"\x1b[H\x1b[2J";

const SEPARATOR: u8 = b':';

/// Frame discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// Pane output, bridge to client
    Data = 0x01,
    /// Keystrokes, client to bridge
    Input = 0x02,
    /// Full-screen capture, bridge to client
    Snapshot = 0x03,
}

impl TryFrom<u8> for FrameType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Data),
            0x02 => Ok(Self::Input),
            0x03 => Ok(Self::Snapshot),
            other => Err(ProtocolError::InvalidFrame(format!(
                "unknown frame type 0x{:02x}",
                other
            ))),
        }
    }
}

/// One binary frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,
    pub pane_id: String,
    pub payload: Bytes,
}

impl Frame {
    pub fn data(pane_id: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            frame_type: FrameType::Data,
            pane_id: pane_id.into(),
            payload: payload.into(),
        }
    }

    pub fn input(pane_id: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            frame_type: FrameType::Input,
            pane_id: pane_id.into(),
            payload: payload.into(),
        }
    }

    /// Frame carrying a full-screen capture.
    ///
    /// The payload homes the cursor and clears the screen, then replays the
    /// capture with bare `\n` turned into `\r\n`.
    pub fn snapshot(pane_id: impl Into<String>, capture: &[u8]) -> Self {
        let mut payload = BytesMut::with_capacity(SNAPSHOT_PREFIX.len() + capture.len() * 2);
        payload.put_slice(SNAPSHOT_PREFIX);
        let mut prev = 0u8;
        for &b in capture {
            if b == b'\n' && prev != b'\r' {
                payload.put_u8(b'\r');
            }
            payload.put_u8(b);
            prev = b;
        }
        Self {
            frame_type: FrameType::Snapshot,
            pane_id: pane_id.into(),
            payload: payload.freeze(),
        }
    }

    /// Whether this frame repaints the whole screen
    pub fn is_snapshot(&self) -> bool {
        self.frame_type == FrameType::Snapshot
    }

    /// Whether this frame carries pane output for the client's screen
    pub fn is_output(&self) -> bool {
        matches!(self.frame_type, FrameType::Data | FrameType::Snapshot)
    }

    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        validate_pane_id(&self.pane_id)?;
        let mut buf = BytesMut::with_capacity(2 + self.pane_id.len() + self.payload.len());
        buf.put_u8(self.frame_type as u8);
        buf.put_slice(self.pane_id.as_bytes());
        buf.put_u8(SEPARATOR);
        buf.put_slice(&self.payload);
        Ok(buf.freeze())
    }

    pub fn decode(raw: &[u8]) -> Result<Self, ProtocolError> {
        let (&type_byte, rest) = raw
            .split_first()
            .ok_or_else(|| ProtocolError::InvalidFrame("empty frame".into()))?;
        let frame_type = FrameType::try_from(type_byte)?;

        let sep = rest
            .iter()
            .position(|b| *b == SEPARATOR)
            .ok_or_else(|| ProtocolError::InvalidFrame("missing pane separator".into()))?;
        let pane_id = std::str::from_utf8(&rest[..sep])
            .map_err(|_| ProtocolError::InvalidFrame("pane id is not UTF-8".into()))?;
        validate_pane_id(pane_id)?;

        Ok(Self {
            frame_type,
            pane_id: pane_id.to_string(),
            payload: Bytes::copy_from_slice(&rest[sep + 1..]),
        })
    }
}

fn validate_pane_id(pane_id: &str) -> Result<(), ProtocolError> {
    if pane_id.is_empty() {
        return Err(ProtocolError::InvalidFrame("empty pane id".into()));
    }
    if pane_id.contains(':') {
        return Err(ProtocolError::InvalidFrame(format!(
            "pane id {:?} contains ':'",
            pane_id
        )));
    }
    Ok(())
}
