//! Configuration schema structs

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The parts of the shared config file the coordinator reads.
///
/// Sections for other binaries (`[client]`, `[bridge]`) are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub coordinator: CoordinatorConfig,
}

/// Coordinator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// How often the session is polled for changes (default: 1000)
    pub refresh_interval_ms: u64,
    /// Outbound messages buffered per connection before frames are dropped
    /// (default: 64)
    pub outbound_queue: usize,
    /// Window user option used to group windows (default: "@panorama-group")
    pub group_attribute: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 1000,
            outbound_queue: 64,
            group_attribute: "@panorama-group".into(),
        }
    }
}

impl CoordinatorConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.refresh_interval(), Duration::from_secs(1));
        assert_eq!(config.outbound_queue, 64);
        assert_eq!(config.group_attribute, "@panorama-group");
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: FileConfig = toml::from_str(
            r#"
            [coordinator]
            outbound_queue = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.coordinator.outbound_queue, 8);
        assert_eq!(config.coordinator.refresh_interval_ms, 1000);
    }

    #[test]
    fn test_other_sections_ignored() {
        let config: FileConfig = toml::from_str(
            r#"
            [client]
            connect_attempts = 9

            [bridge]
            listen = "127.0.0.1:1"
            "#,
        )
        .unwrap();
        assert_eq!(config.coordinator.outbound_queue, 64);
    }
}
