//! Sidebar message types
//!
//! Every unit on the coordinator connection is a [`Message`]: an envelope
//! `{type, client_id, payload}` serialized as one JSON object. The envelope's
//! `type` selects the payload schema; the payload is decoded once, here, into
//! the [`Payload`] sum type so nothing downstream ever inspects raw JSON.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// Closed set of message types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Subscribe,
    Unsubscribe,
    Render,
    Input,
    Resize,
    ViewportUpdate,
    Menu,
    MenuSelect,
    Ping,
    Pong,
}

impl MessageType {
    /// Wire name of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::Render => "render",
            Self::Input => "input",
            Self::Resize => "resize",
            Self::ViewportUpdate => "viewport_update",
            Self::Menu => "menu",
            Self::MenuSelect => "menu_select",
            Self::Ping => "ping",
            Self::Pong => "pong",
        }
    }

    /// Parse a wire name; `None` for types this build does not know
    pub fn from_wire(name: &str) -> Option<Self> {
        Some(match name {
            "subscribe" => Self::Subscribe,
            "unsubscribe" => Self::Unsubscribe,
            "render" => Self::Render,
            "input" => Self::Input,
            "resize" => Self::Resize,
            "viewport_update" => Self::ViewportUpdate,
            "menu" => Self::Menu,
            "menu_select" => Self::MenuSelect,
            "ping" => Self::Ping,
            "pong" => Self::Pong,
            _ => return None,
        })
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal color capability reported by a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorProfile {
    #[default]
    Truecolor,
    Ansi256,
    Ansi16,
    None,
}

/// `subscribe` payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscribePayload {
    pub width: u16,
    pub height: u16,
    pub color_profile: ColorProfile,
    /// Window the subscriber renders for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_id: Option<String>,
}

/// A rectangular clickable area of a render frame.
///
/// Lines and columns are zero-based and inclusive on both ends. An `end_col`
/// of 0 means the region spans the full width.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickableRegion {
    pub start_line: u32,
    pub end_line: u32,
    pub start_col: u32,
    pub end_col: u32,
    pub action: String,
    pub target: String,
}

impl ClickableRegion {
    /// Region covering whole lines `start..=end`
    pub fn lines(start: u32, end: u32, action: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            start_line: start,
            end_line: end,
            start_col: 0,
            end_col: 0,
            action: action.into(),
            target: target.into(),
        }
    }

    /// Whether `(line, col)` falls inside this region
    pub fn contains(&self, line: u32, col: u32) -> bool {
        if line < self.start_line || line > self.end_line {
            return false;
        }
        if col < self.start_col {
            return false;
        }
        self.end_col == 0 || col <= self.end_col
    }
}

/// `render` payload
///
/// `regions` are in content-line coordinates, independent of the viewport.
/// `pinned_regions` are in pinned-area row coordinates; the pinned area is
/// drawn in the last `pinned_height` rows of the screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderPayload {
    pub sequence_number: u64,
    pub content: String,
    pub pinned_content: String,
    pub width: u16,
    pub height: u16,
    pub total_lines: u32,
    pub pinned_height: u16,
    pub viewport_offset: u32,
    pub regions: Vec<ClickableRegion>,
    pub pinned_regions: Vec<ClickableRegion>,
}

/// Kind of user input carried by an `input` message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    #[default]
    Mouse,
    Key,
    Action,
}

/// Mouse button of a mouse input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonKind {
    #[default]
    Left,
    Right,
    Middle,
    WheelUp,
    WheelDown,
}

/// `input` payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputPayload {
    /// Sequence number of the frame the user was looking at
    pub sequence_number: u64,
    pub input_type: InputType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button: Option<ButtonKind>,
    /// Column the click hit
    pub x: u32,
    /// Content line the click hit
    pub y: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_target: Option<String>,
}

impl InputPayload {
    /// Whether the client already resolved this input to an action
    pub fn is_resolved(&self) -> bool {
        self.resolved_action.as_deref().is_some_and(|a| !a.is_empty())
    }
}

/// `resize` payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizePayload {
    pub width: u16,
    pub height: u16,
}

/// `viewport_update` payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportPayload {
    pub viewport_offset: u32,
}

/// One entry of a context menu
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuItem {
    pub label: String,
    pub action: String,
    pub target: String,
}

/// `menu` payload; an empty item list closes any open menu
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuPayload {
    pub title: String,
    pub items: Vec<MenuItem>,
    pub anchor_line: u32,
    pub anchor_col: u32,
}

impl MenuPayload {
    /// A payload that closes the open menu
    pub fn close() -> Self {
        Self::default()
    }

    pub fn is_close(&self) -> bool {
        self.items.is_empty()
    }
}

/// `menu_select` payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuSelectPayload {
    pub action: String,
    pub target: String,
}

/// Decoded payload, one variant per [`MessageType`]
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Subscribe(SubscribePayload),
    Unsubscribe,
    Render(RenderPayload),
    Input(InputPayload),
    Resize(ResizePayload),
    ViewportUpdate(ViewportPayload),
    Menu(MenuPayload),
    MenuSelect(MenuSelectPayload),
    Ping,
    Pong,
}

impl Payload {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Subscribe(_) => MessageType::Subscribe,
            Self::Unsubscribe => MessageType::Unsubscribe,
            Self::Render(_) => MessageType::Render,
            Self::Input(_) => MessageType::Input,
            Self::Resize(_) => MessageType::Resize,
            Self::ViewportUpdate(_) => MessageType::ViewportUpdate,
            Self::Menu(_) => MessageType::Menu,
            Self::MenuSelect(_) => MessageType::MenuSelect,
            Self::Ping => MessageType::Ping,
            Self::Pong => MessageType::Pong,
        }
    }

    fn to_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Subscribe(p) => serde_json::to_value(p),
            Self::Render(p) => serde_json::to_value(p),
            Self::Input(p) => serde_json::to_value(p),
            Self::Resize(p) => serde_json::to_value(p),
            Self::ViewportUpdate(p) => serde_json::to_value(p),
            Self::Menu(p) => serde_json::to_value(p),
            Self::MenuSelect(p) => serde_json::to_value(p),
            Self::Unsubscribe | Self::Ping | Self::Pong => Ok(Value::Object(Default::default())),
        }
    }

    fn from_value(kind: MessageType, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            MessageType::Subscribe => Self::Subscribe(payload_or_default(value)?),
            MessageType::Unsubscribe => Self::Unsubscribe,
            MessageType::Render => Self::Render(payload_or_default(value)?),
            MessageType::Input => Self::Input(payload_or_default(value)?),
            MessageType::Resize => Self::Resize(payload_or_default(value)?),
            MessageType::ViewportUpdate => Self::ViewportUpdate(payload_or_default(value)?),
            MessageType::Menu => Self::Menu(payload_or_default(value)?),
            MessageType::MenuSelect => Self::MenuSelect(payload_or_default(value)?),
            MessageType::Ping => Self::Ping,
            MessageType::Pong => Self::Pong,
        })
    }
}

/// Missing or null payloads decode as the schema's defaults
fn payload_or_default<T: DeserializeOwned + Default>(value: Value) -> Result<T, serde_json::Error> {
    if value.is_null() {
        Ok(T::default())
    } else {
        serde_json::from_value(value)
    }
}

/// Envelope as it appears on the wire
#[derive(Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    client_id: String,
    #[serde(default)]
    payload: Value,
}

/// One logical sidebar event
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub client_id: String,
    pub payload: Payload,
}

impl Message {
    pub fn new(client_id: impl Into<String>, payload: Payload) -> Self {
        Self {
            client_id: client_id.into(),
            payload,
        }
    }

    pub fn message_type(&self) -> MessageType {
        self.payload.message_type()
    }

    /// Serialize as one JSON object without the trailing newline
    pub fn encode_line(&self) -> Result<String, ProtocolError> {
        let envelope = Envelope {
            kind: self.message_type().as_str().to_string(),
            client_id: self.client_id.clone(),
            payload: self.payload.to_value()?,
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    /// Decode one JSON object.
    ///
    /// Returns `Ok(None)` for a well-formed message whose `type` is unknown;
    /// such messages are skipped, never treated as errors.
    pub fn decode_line(line: &[u8]) -> Result<Option<Self>, ProtocolError> {
        let envelope: Envelope = serde_json::from_slice(line)?;
        let Some(kind) = MessageType::from_wire(&envelope.kind) else {
            tracing::trace!(kind = %envelope.kind, "skipping unknown message type");
            return Ok(None);
        };
        let payload = Payload::from_value(kind, envelope.payload)?;
        Ok(Some(Self {
            client_id: envelope.client_id,
            payload,
        }))
    }
}
