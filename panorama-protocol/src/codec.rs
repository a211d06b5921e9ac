//! Newline-delimited JSON codec for the coordinator socket
//!
//! Decoding is tolerant per line: an unknown `type` is skipped and a
//! malformed line is dropped with a warning, so one bad unit never ends the
//! stream. A line longer than the limit does end it, since the framing can no
//! longer be trusted.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::messages::Message;

/// Default line limit (4 MiB)
pub const DEFAULT_MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

/// Codec for [`Message`] in both directions
#[derive(Debug, Clone)]
pub struct MessageCodec {
    max_line_bytes: usize,
    /// Bytes of the buffer already scanned for a newline
    scanned: usize,
}

impl MessageCodec {
    pub fn new() -> Self {
        Self::with_max_line_bytes(DEFAULT_MAX_LINE_BYTES)
    }

    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            max_line_bytes,
            scanned: 0,
        }
    }

    pub fn max_line_bytes(&self) -> usize {
        self.max_line_bytes
    }

    /// Interpret one complete line; `None` means skip it
    fn decode_one(&self, line: &[u8]) -> Result<Option<Message>, ProtocolError> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.len() > self.max_line_bytes {
            return Err(ProtocolError::FrameTooLarge {
                size: line.len(),
                max: self.max_line_bytes,
            });
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        match Message::decode_line(line) {
            Ok(msg) => Ok(msg),
            Err(e) => {
                tracing::warn!(error = %e, len = line.len(), "dropping malformed message");
                Ok(None)
            }
        }
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let newline = src[self.scanned..].iter().position(|b| *b == b'\n');
            let Some(offset) = newline else {
                // +1 leaves room for a trailing '\r'
                if src.len() > self.max_line_bytes + 1 {
                    return Err(ProtocolError::FrameTooLarge {
                        size: src.len(),
                        max: self.max_line_bytes,
                    });
                }
                self.scanned = src.len();
                return Ok(None);
            };

            let end = self.scanned + offset;
            let line = src.split_to(end + 1);
            self.scanned = 0;

            if let Some(msg) = self.decode_one(&line[..end])? {
                return Ok(Some(msg));
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(msg) = self.decode(src)? {
            return Ok(Some(msg));
        }
        if src.is_empty() {
            return Ok(None);
        }
        // Final line without a terminating newline
        let line = src.split_to(src.len());
        self.scanned = 0;
        self.decode_one(&line)
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = item.encode_line()?;
        if line.len() > self.max_line_bytes {
            return Err(ProtocolError::FrameTooLarge {
                size: line.len(),
                max: self.max_line_bytes,
            });
        }
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}
