//! Client configuration
//!
//! Reads the `[client]` section of the shared config file; other sections
//! belong to the coordinator and bridge and are ignored here.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use panorama_utils::{config_file, PanoramaError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    client: ClientConfig,
}

/// Render client timing and scrolling
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Connection attempts per reconnect cycle
    pub connect_attempts: u32,
    /// Pause between attempts within one cycle
    pub retry_backoff_ms: u64,
    /// Pause before the cycle that follows a dropped connection
    pub reconnect_delay_ms: u64,
    /// Keep-alive interval while connected
    pub ping_interval_ms: u64,
    /// Lines moved per wheel notch or arrow key
    pub scroll_lines: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_attempts: 3,
            retry_backoff_ms: 1000,
            reconnect_delay_ms: 1000,
            ping_interval_ms: 5000,
            scroll_lines: 3,
        }
    }
}

impl ClientConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    /// Load from `path`, or the default config file; a missing default file
    /// yields the defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => {
                let path = config_file();
                if path.exists() {
                    Self::load_from_path(&path)?
                } else {
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PanoramaError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let file: FileConfig = toml::from_str(&content).map_err(|e| PanoramaError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(file.client)
    }

    pub fn validate(&self) -> Result<()> {
        if self.connect_attempts == 0 {
            return Err(PanoramaError::config("connect_attempts must be at least 1"));
        }
        if self.ping_interval_ms == 0 {
            return Err(PanoramaError::config("ping_interval_ms must be at least 1"));
        }
        if self.scroll_lines == 0 {
            return Err(PanoramaError::config("scroll_lines must be at least 1"));
        }
        Ok(())
    }
}
