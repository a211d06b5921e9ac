//! panorama-utils: Common utilities shared across panorama crates
//!
//! This crate provides:
//! - Unified error types ([`PanoramaError`], [`Result`])
//! - Logging infrastructure ([`init_logging`], [`LogConfig`])
//! - XDG-compliant path utilities ([`paths`] module)

pub mod error;
pub mod logging;
pub mod paths;

// Re-export main types at crate root for convenience
pub use error::{PanoramaError, Result};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogOutput};

// Re-export commonly used path functions
pub use paths::{
    config_dir, config_file, ensure_dir, log_dir, runtime_dir, socket_path_for_session,
    state_dir, token_file,
};
