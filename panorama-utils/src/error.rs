//! Error types for panorama
//!
//! Provides a unified error type used across all panorama crates.

use std::path::PathBuf;

/// Main error type for panorama operations
#[derive(Debug, thiserror::Error)]
pub enum PanoramaError {
    // === IO Errors ===

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Connection Errors ===

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Coordinator not running at {path}")]
    CoordinatorNotRunning { path: PathBuf },

    #[error("Connection timeout after {millis}ms")]
    ConnectionTimeout { millis: u64 },

    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    // === Protocol Errors ===

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    // === Multiplexer Errors ===

    #[error("Multiplexer error: {0}")]
    Mux(String),

    #[error("Control session error: {0}")]
    ControlSession(String),

    #[error("Window not found: {0}")]
    WindowNotFound(String),

    #[error("Pane not found: {0}")]
    PaneNotFound(String),

    // === Auth Errors ===

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PanoramaError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a multiplexer error
    pub fn mux(msg: impl Into<String>) -> Self {
        Self::Mux(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this error is a transport failure worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionTimeout { .. }
            | Self::Connection(_)
            | Self::ConnectionClosed
            | Self::CoordinatorNotRunning { .. } => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotFound
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

/// Result type alias using PanoramaError
pub type Result<T> = std::result::Result<T, PanoramaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_connection() {
        let err = PanoramaError::Connection("refused".into());
        assert_eq!(err.to_string(), "Connection failed: refused");
    }

    #[test]
    fn test_error_display_coordinator_not_running() {
        let err = PanoramaError::CoordinatorNotRunning {
            path: PathBuf::from("/tmp/panorama/main.sock"),
        };
        let msg = err.to_string();
        assert!(msg.contains("Coordinator not running"));
        assert!(msg.contains("/tmp/panorama/main.sock"));
    }

    #[test]
    fn test_error_display_config_invalid() {
        let err = PanoramaError::ConfigInvalid {
            path: PathBuf::from("/home/user/.config/panorama/config.toml"),
            message: "expected a table".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Invalid configuration"));
        assert!(msg.contains("config.toml"));
        assert!(msg.contains("expected a table"));
    }

    #[test]
    fn test_error_display_timeout() {
        let err = PanoramaError::ConnectionTimeout { millis: 1000 };
        assert_eq!(err.to_string(), "Connection timeout after 1000ms");
    }

    #[test]
    fn test_transport_errors_are_retryable() {
        assert!(PanoramaError::connection("refused").is_retryable());
        assert!(PanoramaError::ConnectionClosed.is_retryable());
        assert!(PanoramaError::ConnectionTimeout { millis: 5 }.is_retryable());
        assert!(PanoramaError::CoordinatorNotRunning {
            path: PathBuf::from("/tmp/x.sock")
        }
        .is_retryable());
    }

    #[test]
    fn test_io_refused_is_retryable() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(PanoramaError::from(io_err).is_retryable());

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(!PanoramaError::from(io_err).is_retryable());
    }

    #[test]
    fn test_not_retryable_errors() {
        let non_retryable = [
            PanoramaError::protocol("bad frame"),
            PanoramaError::InvalidMessage("bad".into()),
            PanoramaError::config("bad"),
            PanoramaError::mux("tmux exited"),
            PanoramaError::ControlSession("line too long".into()),
            PanoramaError::WindowNotFound("@1".into()),
            PanoramaError::PaneNotFound("%1".into()),
            PanoramaError::Unauthorized("missing token".into()),
            PanoramaError::internal("oops"),
        ];

        for err in non_retryable {
            assert!(!err.is_retryable(), "Expected {:?} to NOT be retryable", err);
        }
    }

    #[test]
    fn test_helpers_build_matching_variants() {
        assert!(matches!(PanoramaError::connection("x"), PanoramaError::Connection(_)));
        assert!(matches!(PanoramaError::protocol("x"), PanoramaError::Protocol(_)));
        assert!(matches!(PanoramaError::config("x"), PanoramaError::Config(_)));
        assert!(matches!(PanoramaError::mux("x"), PanoramaError::Mux(_)));
        assert!(matches!(PanoramaError::internal("x"), PanoramaError::Internal(_)));
    }

    #[test]
    fn test_from_io_error_preserves_kind() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: PanoramaError = io_err.into();
        if let PanoramaError::Io(inner) = err {
            assert_eq!(inner.kind(), std::io::ErrorKind::PermissionDenied);
        } else {
            panic!("Expected Io variant");
        }
    }
}
