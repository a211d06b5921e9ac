//! Configuration for the bridge
//!
//! Reads the `[bridge]` section of the shared panorama config file.

mod loader;
mod schema;

pub use loader::ConfigLoader;
pub use schema::{BridgeConfig, FileConfig};
