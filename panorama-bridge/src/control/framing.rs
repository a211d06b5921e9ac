//! Line framing for control-mode stdout

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use super::ControlError;

/// Splits control-mode output into lines.
///
/// The read buffer starts at `initial` bytes and grows as a long line
/// arrives. A line longer than `max` bytes (not counting the newline) is an
/// error; exactly `max` is fine. A trailing `\r` is stripped.
#[derive(Debug, Clone)]
pub struct ControlLineCodec {
    initial: usize,
    max: usize,
    /// Bytes already searched for a newline
    scanned: usize,
}

impl ControlLineCodec {
    pub fn new(initial: usize, max: usize) -> Self {
        Self {
            initial,
            max,
            scanned: 0,
        }
    }

    /// Buffer size to start reading with
    pub fn initial_capacity(&self) -> usize {
        self.initial
    }

    pub fn max_line_bytes(&self) -> usize {
        self.max
    }

    fn take_line(&mut self, buf: &mut BytesMut, end: usize) -> Result<Vec<u8>, ControlError> {
        self.scanned = 0;
        let mut line = buf.split_to(end).to_vec();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.len() > self.max {
            return Err(ControlError::LineTooLong { limit: self.max });
        }
        Ok(line)
    }
}

impl Decoder for ControlLineCodec {
    type Item = Vec<u8>;
    type Error = ControlError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match buf[self.scanned..].iter().position(|b| *b == b'\n') {
            Some(offset) => {
                let end = self.scanned + offset;
                let line = self.take_line(buf, end)?;
                // newline
                let _ = buf.split_to(1);
                Ok(Some(line))
            }
            None => {
                // One extra byte leaves room for a trailing '\r'
                if buf.len() > self.max + 1 {
                    return Err(ControlError::LineTooLong { limit: self.max });
                }
                self.scanned = buf.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        let end = buf.len();
        self.take_line(buf, end).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut ControlLineCodec, input: &[u8]) -> Vec<Vec<u8>> {
        let mut buf = BytesMut::from(input);
        let mut lines = Vec::new();
        while let Some(line) = codec.decode(&mut buf).unwrap() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_splits_lines_and_strips_cr() {
        let mut codec = ControlLineCodec::new(16, 64);
        let lines = decode_all(&mut codec, b"%begin 1 1 0\r\n%end 1 1 0\npartial");
        assert_eq!(lines, vec![b"%begin 1 1 0".to_vec(), b"%end 1 1 0".to_vec()]);
    }

    #[test]
    fn test_line_split_across_reads() {
        let mut codec = ControlLineCodec::new(4, 64);
        let mut buf = BytesMut::from(&b"%output %1 he"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"llo\n");
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), b"%output %1 hello");
    }

    #[test]
    fn test_grows_past_initial_capacity() {
        let mut codec = ControlLineCodec::new(4, 1024);
        let long = vec![b'a'; 500];
        let mut input = long.clone();
        input.push(b'\n');
        assert_eq!(decode_all(&mut codec, &input), vec![long]);
    }

    #[test]
    fn test_line_of_exactly_max_succeeds() {
        let mut codec = ControlLineCodec::new(4, 32);
        let mut input = vec![b'x'; 32];
        input.push(b'\n');
        assert_eq!(decode_all(&mut codec, &input)[0].len(), 32);
    }

    #[test]
    fn test_line_over_max_fails() {
        let mut codec = ControlLineCodec::new(4, 32);
        let mut buf = BytesMut::from(&[b'x'; 33][..]);
        buf.extend_from_slice(b"\n");
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ControlError::LineTooLong { limit: 32 })
        ));
    }

    #[test]
    fn test_unterminated_line_over_max_fails_early() {
        let mut codec = ControlLineCodec::new(4, 32);
        let mut buf = BytesMut::from(&[b'x'; 40][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ControlError::LineTooLong { .. })
        ));
    }

    #[test]
    fn test_eof_flushes_final_line() {
        let mut codec = ControlLineCodec::new(4, 32);
        let mut buf = BytesMut::from(&b"%exit"[..]);
        assert_eq!(codec.decode_eof(&mut buf).unwrap().unwrap(), b"%exit");
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }
}
