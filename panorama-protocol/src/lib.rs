//! panorama-protocol: Wire definitions shared by every panorama component
//!
//! This crate defines the sidebar message protocol spoken between render
//! clients and the coordinator (newline-delimited JSON over a Unix socket),
//! the binary frames and JSON control messages spoken between the bridge and
//! its network clients, and the client-side helpers that interpret render
//! frames (hit-testing, stale-frame tracking, viewport clamping).

pub mod bridge;
pub mod codec;
pub mod error;
pub mod frame;
pub mod messages;
pub mod tracker;
pub mod viewport;

// Re-export main types at crate root
pub use bridge::{BridgeMessage, ClientText, PtyMode};
pub use codec::{MessageCodec, DEFAULT_MAX_LINE_BYTES};
pub use error::ProtocolError;
pub use frame::{Frame, FrameType};
pub use messages::{
    ButtonKind, ClickableRegion, ColorProfile, InputPayload, InputType, MenuItem, MenuPayload,
    MenuSelectPayload, Message, MessageType, Payload, RenderPayload, ResizePayload,
    SubscribePayload, ViewportPayload,
};
pub use tracker::FrameTracker;
pub use viewport::Viewport;
