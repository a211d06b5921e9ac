//! panorama-bridge: Raw-output bridge
//!
//! Attaches a tmux control-mode client to one session and fans pane output
//! out to WebSocket clients as binary frames. Clients send keystrokes back
//! the same way, follow session focus or pin a pane, and get full-screen
//! snapshots when live output goes quiet. Each client can also drive a
//! sidebar through the coordinator.

pub mod auth;
pub mod cli;
pub mod config;
pub mod control;
pub mod fanout;
pub mod pairing;
pub mod reconcile;
pub mod registry;
pub mod server;
pub mod sidebar;

pub use control::{ControlError, ControlSession, PaneIo};
pub use reconcile::Reconciler;
pub use registry::{ClientConn, ClientRegistry, Outbound};
pub use server::BridgeState;
