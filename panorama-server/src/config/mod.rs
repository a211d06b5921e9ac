//! Configuration for the coordinator
//!
//! Reads the `[coordinator]` section of the shared panorama config file.

mod loader;
mod schema;

pub use loader::ConfigLoader;
pub use schema::{CoordinatorConfig, FileConfig};
