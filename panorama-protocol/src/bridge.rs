//! JSON text messages between the bridge and its network clients
//!
//! Text frames on a bridge connection carry either one of the bridge's own
//! control messages or a sidebar [`Message`] being relayed to or from the
//! coordinator. The two share the `type` key and never share a type name.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::messages::Message;

/// How pane output currently reaches a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PtyMode {
    /// Live `%output` bytes
    #[default]
    Streaming,
    /// Periodic full-screen captures
    Snapshot,
}

impl std::fmt::Display for PtyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Streaming => f.write_str("streaming"),
            Self::Snapshot => f.write_str("snapshot"),
        }
    }
}

/// Bridge control messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    /// Bridge to client, first message on a connection
    Hello {
        client_seq: u64,
        pane_id: String,
        window_id: String,
    },
    /// Bridge to client, the attached pane changed
    PaneSwitch { pane_id: String, window_id: String },
    /// Bridge to client, delivery mode changed
    PtyHealth { mode: PtyMode, healthy: bool },
    /// Client to bridge; `None` follows session focus
    Attach {
        #[serde(default)]
        pane_id: Option<String>,
    },
    /// Client to bridge, the client's terminal size
    PtyResize { cols: u16, rows: u16 },
}

const BRIDGE_TYPES: &[&str] = &["hello", "pane_switch", "pty_health", "attach", "pty_resize"];

impl BridgeMessage {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A classified text frame
#[derive(Debug, Clone, PartialEq)]
pub enum ClientText {
    Bridge(BridgeMessage),
    Sidebar(Message),
}

#[derive(Deserialize)]
struct TypeTag {
    #[serde(rename = "type")]
    kind: String,
}

impl ClientText {
    /// Classify a text frame.
    ///
    /// `Ok(None)` is a well-formed frame of a type nobody knows; callers skip
    /// it. Malformed frames are errors the caller logs and drops.
    pub fn parse(text: &str) -> Result<Option<Self>, ProtocolError> {
        let tag: TypeTag = serde_json::from_str(text)?;
        if BRIDGE_TYPES.contains(&tag.kind.as_str()) {
            return Ok(Some(Self::Bridge(serde_json::from_str(text)?)));
        }
        Ok(Message::decode_line(text.as_bytes())?.map(Self::Sidebar))
    }
}
