//! Bridge protocol decoding for one remote client

use bytes::Bytes;
use tracing::{debug, info, trace};

use panorama_protocol::{
    BridgeMessage, ClientText, Frame, FrameTracker, Message, Payload, PtyMode, RenderPayload,
};
use panorama_utils::{PanoramaError, Result};

use crate::widget::TerminalWidget;

/// What applying one inbound message changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// Nothing visible changed
    None,
    /// The widget was written to
    Screen,
    /// Now attached to another pane
    Attached { pane_id: String, window_id: String },
    /// Delivery mode changed
    Health { mode: PtyMode, healthy: bool },
    /// A newer sidebar frame was accepted
    Sidebar,
}

/// A message ready to send to the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Binary(Bytes),
    Text(String),
}

/// Client-side state of a bridge connection.
///
/// Output is only applied for the attached pane, so bytes still in flight
/// from a pane the bridge just switched away from are dropped.
///
/// Sidebar frames are ordered per subscription. The `client_id` of a render
/// names its subscription; a frame from a different one restarts the stale
/// check. This covers the cached render the bridge replays on connect, which
/// belongs to another client, and the re-subscribe after a window change.
pub struct RemoteAdapter<W: TerminalWidget> {
    widget: W,
    client_seq: Option<u64>,
    pane_id: Option<String>,
    window_id: Option<String>,
    mode: PtyMode,
    healthy: bool,
    sidebar: FrameTracker,
    /// Subscription of the applied sidebar frame
    sidebar_id: Option<String>,
}

impl<W: TerminalWidget> RemoteAdapter<W> {
    pub fn new(widget: W) -> Self {
        Self {
            widget,
            client_seq: None,
            pane_id: None,
            window_id: None,
            mode: PtyMode::Streaming,
            healthy: true,
            sidebar: FrameTracker::new(),
            sidebar_id: None,
        }
    }

    pub fn widget(&self) -> &W {
        &self.widget
    }

    pub fn widget_mut(&mut self) -> &mut W {
        &mut self.widget
    }

    /// Sequence number the bridge assigned in `hello`
    pub fn client_seq(&self) -> Option<u64> {
        self.client_seq
    }

    pub fn pane_id(&self) -> Option<&str> {
        self.pane_id.as_deref()
    }

    pub fn window_id(&self) -> Option<&str> {
        self.window_id.as_deref()
    }

    pub fn mode(&self) -> PtyMode {
        self.mode
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    /// Latest sidebar frame relayed by the bridge
    pub fn sidebar(&self) -> Option<&RenderPayload> {
        self.sidebar.current()
    }

    /// Apply a binary WebSocket message
    pub fn handle_binary(&mut self, raw: &[u8]) -> Result<Update> {
        let frame = Frame::decode(raw)?;
        if !frame.is_output() {
            trace!(pane_id = %frame.pane_id, "ignoring non-output frame");
            return Ok(Update::None);
        }
        if self.pane_id.as_deref() != Some(frame.pane_id.as_str()) {
            trace!(pane_id = %frame.pane_id, "dropping output for another pane");
            return Ok(Update::None);
        }
        if frame.is_snapshot() {
            self.widget.reset();
        }
        self.widget.write(&frame.payload);
        Ok(Update::Screen)
    }

    /// Apply a text WebSocket message
    pub fn handle_text(&mut self, text: &str) -> Result<Update> {
        let Some(parsed) = ClientText::parse(text)? else {
            return Ok(Update::None);
        };
        match parsed {
            ClientText::Bridge(BridgeMessage::Hello {
                client_seq,
                pane_id,
                window_id,
            }) => {
                info!(client_seq, %pane_id, "connected to bridge");
                self.client_seq = Some(client_seq);
                Ok(self.retarget(pane_id, window_id))
            }
            ClientText::Bridge(BridgeMessage::PaneSwitch { pane_id, window_id }) => {
                debug!(%pane_id, %window_id, "pane switched");
                Ok(self.retarget(pane_id, window_id))
            }
            ClientText::Bridge(BridgeMessage::PtyHealth { mode, healthy }) => {
                if mode == self.mode && healthy == self.healthy {
                    return Ok(Update::None);
                }
                debug!(%mode, healthy, "delivery mode changed");
                self.mode = mode;
                self.healthy = healthy;
                Ok(Update::Health { mode, healthy })
            }
            ClientText::Bridge(other) => {
                trace!(?other, "ignoring client-to-bridge message");
                Ok(Update::None)
            }
            ClientText::Sidebar(Message {
                client_id,
                payload: Payload::Render(render),
            }) => Ok(self.apply_render(client_id, render)),
            ClientText::Sidebar(msg) => {
                trace!(kind = %msg.message_type(), "ignoring sidebar message");
                Ok(Update::None)
            }
        }
    }

    fn apply_render(&mut self, client_id: String, render: RenderPayload) -> Update {
        if self.sidebar_id.as_deref() != Some(client_id.as_str()) {
            debug!(from = ?self.sidebar_id, to = %client_id, "sidebar subscription changed");
            self.sidebar.invalidate();
            self.sidebar_id = Some(client_id);
        }
        if self.sidebar.apply(render) {
            Update::Sidebar
        } else {
            Update::None
        }
    }

    fn retarget(&mut self, pane_id: String, window_id: String) -> Update {
        self.widget.reset();
        self.pane_id = Some(pane_id.clone());
        self.window_id = Some(window_id.clone());
        Update::Attached { pane_id, window_id }
    }

    /// Keystrokes for the attached pane
    pub fn key_input(&self, data: &[u8]) -> Result<Outgoing> {
        let pane_id = self
            .pane_id
            .as_deref()
            .ok_or_else(|| PanoramaError::PaneNotFound("not attached".into()))?;
        let frame = Frame::input(pane_id, Bytes::copy_from_slice(data));
        Ok(Outgoing::Binary(frame.encode()?))
    }

    /// Resize the local widget and tell the bridge
    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<Outgoing> {
        self.widget.resize(cols, rows);
        let msg = BridgeMessage::PtyResize { cols, rows };
        Ok(Outgoing::Text(msg.to_json()?))
    }

    /// Pin to `pane_id`, or follow session focus with `None`
    pub fn attach(&self, pane_id: Option<&str>) -> Result<Outgoing> {
        let msg = BridgeMessage::Attach {
            pane_id: pane_id.map(str::to_string),
        };
        Ok(Outgoing::Text(msg.to_json()?))
    }

    /// Sidebar message relayed through the bridge to the coordinator
    pub fn sidebar_message(&self, msg: &Message) -> Result<Outgoing> {
        Ok(Outgoing::Text(msg.encode_line()?))
    }
}
