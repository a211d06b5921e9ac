//! Configuration loader

use std::path::Path;

use panorama_utils::{config_file, PanoramaError, Result};

use super::{CoordinatorConfig, FileConfig};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the default location, or defaults if absent
    pub fn load() -> Result<CoordinatorConfig> {
        let path = config_file();
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            Ok(CoordinatorConfig::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<CoordinatorConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| PanoramaError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content, path)
    }

    /// Parse configuration from string
    pub fn parse(content: &str, path: &Path) -> Result<CoordinatorConfig> {
        let file: FileConfig = toml::from_str(content).map_err(|e| PanoramaError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(file.coordinator)
    }

    /// Validate configuration
    pub fn validate(config: &CoordinatorConfig) -> Result<()> {
        if config.refresh_interval_ms == 0 {
            return Err(PanoramaError::config("refresh_interval_ms must be at least 1"));
        }
        if config.outbound_queue == 0 {
            return Err(PanoramaError::config("outbound_queue must be at least 1"));
        }
        if config.group_attribute.is_empty() {
            return Err(PanoramaError::config("group_attribute must not be empty"));
        }
        Ok(())
    }

    /// Load (from `path` when given) and validate
    pub fn load_and_validate(path: Option<&Path>) -> Result<CoordinatorConfig> {
        let config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::load()?,
        };
        Self::validate(&config)?;
        Ok(config)
    }
}
