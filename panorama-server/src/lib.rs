//! panorama-server: Sidebar coordinator
//!
//! Owns the subscriber registry for one multiplexer session, renders the
//! sidebar for each subscriber and turns clicks into multiplexer commands.

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod handlers;
pub mod listener;
pub mod registry;
pub mod render;

pub use coordinator::Coordinator;
pub use registry::{ConnId, SubscriberRegistry};
pub use render::{PlainRenderer, RenderOutput, Renderer, ViewContext};
