//! Configuration loader

use std::path::Path;

use panorama_utils::{config_file, PanoramaError, Result};

use super::{BridgeConfig, FileConfig};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the default location, or defaults if absent
    pub fn load() -> Result<BridgeConfig> {
        let path = config_file();
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            Ok(BridgeConfig::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<BridgeConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| PanoramaError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content, path)
    }

    /// Parse configuration from string
    pub fn parse(content: &str, path: &Path) -> Result<BridgeConfig> {
        let file: FileConfig = toml::from_str(content).map_err(|e| PanoramaError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(file.bridge)
    }

    /// Validate configuration
    pub fn validate(config: &BridgeConfig) -> Result<()> {
        if !config.listen.ip().is_loopback() {
            return Err(PanoramaError::config(format!(
                "listen address {} is not loopback",
                config.listen
            )));
        }
        for (name, value) in [
            ("reconcile_interval_ms", config.reconcile_interval_ms),
            ("quiet_threshold_ms", config.quiet_threshold_ms),
            ("write_timeout_ms", config.write_timeout_ms),
        ] {
            if value == 0 {
                return Err(PanoramaError::config(format!("{} must be at least 1", name)));
            }
        }
        if config.initial_line_bytes == 0 {
            return Err(PanoramaError::config("initial_line_bytes must be at least 1"));
        }
        if config.max_line_bytes < config.initial_line_bytes {
            return Err(PanoramaError::config(
                "max_line_bytes must not be smaller than initial_line_bytes",
            ));
        }
        if config.username.is_some() != config.password.is_some() {
            return Err(PanoramaError::config(
                "username and password must be set together",
            ));
        }
        Ok(())
    }

    /// Load (from `path` when given) and validate
    pub fn load_and_validate(path: Option<&Path>) -> Result<BridgeConfig> {
        let config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::load()?,
        };
        Self::validate(&config)?;
        Ok(config)
    }
}
