//! Configuration schema structs

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The parts of the shared config file the bridge reads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub bridge: BridgeConfig,
}

/// Bridge settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// HTTP listen address; must be loopback (default: 127.0.0.1:7681)
    pub listen: SocketAddr,
    /// Focus and snapshot reconciliation period (default: 2000)
    pub reconcile_interval_ms: u64,
    /// Silence after which a client falls back to snapshots (default: 2500)
    pub quiet_threshold_ms: u64,
    /// Deadline for one write to a network client (default: 1000)
    pub write_timeout_ms: u64,
    /// Longest control-mode line accepted (default: 4 MiB)
    pub max_line_bytes: usize,
    /// Control-mode read buffer to start with (default: 64 KiB)
    pub initial_line_bytes: usize,
    /// Optional second factor next to the token
    pub username: Option<String>,
    pub password: Option<String>,
    /// URL printed and encoded by `/connect`, e.g. a reverse proxy
    pub public_url: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::LOCALHOST, 7681)),
            reconcile_interval_ms: 2000,
            quiet_threshold_ms: 2500,
            write_timeout_ms: 1000,
            max_line_bytes: 4 * 1024 * 1024,
            initial_line_bytes: 64 * 1024,
            username: None,
            password: None,
            public_url: None,
        }
    }
}

impl BridgeConfig {
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.reconcile_interval_ms)
    }

    pub fn quiet_threshold(&self) -> Duration {
        Duration::from_millis(self.quiet_threshold_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Configured username and password, when both are set
    pub fn basic_credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}
