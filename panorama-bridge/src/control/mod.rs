//! tmux control-mode session
//!
//! One `tmux -C` client attached to the mirrored session. Its stdout carries
//! pane output and command replies; its stdin takes commands.

pub mod escape;
pub mod framing;
pub mod parser;
pub mod session;

use panorama_utils::PanoramaError;

pub use framing::ControlLineCodec;
pub use parser::{ControlEvent, ControlParser};
pub use session::{ControlSession, PaneIo};

/// Errors from the control session
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("control line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("control session ended")]
    SessionEnded,

    #[error("command failed: {0}")]
    CommandFailed(String),

    #[error("control session IO: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ControlError> for PanoramaError {
    fn from(e: ControlError) -> Self {
        match e {
            ControlError::Io(e) => PanoramaError::Io(e),
            other => PanoramaError::ControlSession(other.to_string()),
        }
    }
}
