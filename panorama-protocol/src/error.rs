//! Protocol error type

use panorama_utils::PanoramaError;

/// Errors raised while framing or decoding protocol units
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
}

impl From<ProtocolError> for PanoramaError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(e) => PanoramaError::Io(e),
            ProtocolError::Malformed(e) => PanoramaError::InvalidMessage(e.to_string()),
            other => PanoramaError::Protocol(other.to_string()),
        }
    }
}
