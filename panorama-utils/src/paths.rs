//! Path utilities for panorama
//!
//! Handles XDG Base Directory specification compliance for config,
//! state, and runtime directories, and derives the per-session socket
//! path shared by the coordinator, the render client and the bridge.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use sha2::{Digest, Sha256};

/// Application identifier for XDG directories
const APP_NAME: &str = "panorama";

/// Longest sanitized session prefix kept in a socket file name
const MAX_SANITIZED_LEN: usize = 32;

/// Get project directories
fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

/// Get the runtime directory
///
/// Location: `$XDG_RUNTIME_DIR/panorama` or `/tmp/panorama-$UID`
pub fn runtime_dir() -> PathBuf {
    if let Ok(xdg_runtime) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(xdg_runtime).join(APP_NAME)
    } else {
        // SAFETY: getuid() is always safe to call
        let uid = unsafe { libc::getuid() };
        PathBuf::from(format!("/tmp/{}-{}", APP_NAME, uid))
    }
}

/// Reduce a session name to characters that are safe in a file name.
///
/// Keeps `[A-Za-z0-9_-]`, replaces everything else with `_`, and truncates
/// to 32 characters.
pub fn sanitize_session_name(session: &str) -> String {
    session
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_SANITIZED_LEN)
        .collect()
}

fn session_hash8(session: &str) -> String {
    let digest = Sha256::digest(session.as_bytes());
    hex::encode(&digest[..4])
}

/// Get the coordinator socket path for a multiplexer session
///
/// Location: `<runtime_dir>/<sanitized>-<hash8>.sock`
///
/// The hash is taken over the raw session name, so two sessions that
/// sanitize to the same prefix still get distinct sockets.
pub fn socket_path_for_session(session: &str) -> PathBuf {
    runtime_dir().join(format!(
        "{}-{}.sock",
        sanitize_session_name(session),
        session_hash8(session)
    ))
}

/// Get the configuration directory
///
/// Location: `$XDG_CONFIG_HOME/panorama` or `~/.config/panorama`
pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(fallback_config_dir)
}

/// Get the main configuration file path
///
/// Location: `$XDG_CONFIG_HOME/panorama/config.toml`
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Get the state directory
///
/// Location: `$XDG_STATE_HOME/panorama` or `~/.local/state/panorama`
pub fn state_dir() -> PathBuf {
    project_dirs()
        .and_then(|p| p.state_dir().map(|d| d.to_path_buf()))
        .unwrap_or_else(fallback_state_dir)
}

/// Get the log directory
///
/// Location: `$XDG_STATE_HOME/panorama/log`
pub fn log_dir() -> PathBuf {
    state_dir().join("log")
}

/// Get the bridge bearer token file
///
/// Location: `$XDG_STATE_HOME/panorama/bridge.token`
pub fn token_file() -> PathBuf {
    state_dir().join("bridge.token")
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

// Fallback implementations when ProjectDirs is unavailable

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

fn fallback_config_dir() -> PathBuf {
    home_dir().join(".config").join(APP_NAME)
}

fn fallback_state_dir() -> PathBuf {
    home_dir().join(".local").join("state").join(APP_NAME)
}
