//! panorama-remote - client side of the raw output bridge
//!
//! Decodes what a bridge sends over its WebSocket and drives a local
//! terminal widget with it. The widget is abstract; [`Vt100Widget`] is the
//! in-memory implementation.

pub mod adapter;
pub mod session;
pub mod widget;

pub use adapter::{Outgoing, RemoteAdapter, Update};
pub use session::RemoteSession;
pub use widget::{TerminalWidget, Vt100Widget};
