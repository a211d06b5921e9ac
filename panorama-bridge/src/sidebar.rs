//! Sidebar links: one coordinator connection per network client
//!
//! A network client speaks the sidebar protocol through the bridge. The
//! bridge subscribes on its behalf under a [`SidebarIdentity`] that names the
//! window the client is watching, so the coordinator renders the right
//! window. When the client's window changes, the link unsubscribes the old
//! identity and subscribes the new one on the same connection.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use panorama_mux::Multiplexer;
use panorama_protocol::{Message, MessageCodec, Payload, SubscribePayload};
use panorama_utils::{PanoramaError, Result};

use crate::registry::{ClientConn, ClientRegistry, Outbound};

/// Messages queued toward the coordinator per link
const LINK_QUEUE: usize = 64;

/// Coordinator-side name of a network client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarIdentity {
    pub window_id: String,
    pub client_seq: u64,
}

impl SidebarIdentity {
    pub fn new(window_id: impl Into<String>, client_seq: u64) -> Self {
        Self {
            window_id: window_id.into(),
            client_seq,
        }
    }
}

impl fmt::Display for SidebarIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "web-{}-{}", self.window_id, self.client_seq)
    }
}

/// Where a forwarded message moves focus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusTarget {
    Window(String),
    Pane(String),
}

impl FocusTarget {
    /// The focus change `payload` asks for, if any
    pub fn of(payload: &Payload) -> Option<Self> {
        let (action, target) = match payload {
            Payload::Input(input) if input.is_resolved() => (
                input.resolved_action.as_deref()?,
                input.resolved_target.as_deref()?,
            ),
            Payload::MenuSelect(select) => (select.action.as_str(), select.target.as_str()),
            _ => return None,
        };
        if target.is_empty() {
            return None;
        }
        match action {
            "select_window" => Some(Self::Window(target.to_string())),
            "select_pane" => Some(Self::Pane(target.to_string())),
            _ => None,
        }
    }

    /// Window this target lives in
    pub async fn window(&self, mux: &dyn Multiplexer) -> Result<String> {
        match self {
            Self::Window(id) => Ok(id.clone()),
            Self::Pane(id) => mux.window_of_pane(id).await,
        }
    }
}

/// A network client's subscription on the coordinator
#[derive(Debug)]
pub struct SidebarLink {
    identity: SidebarIdentity,
    /// Last subscribe from the client, replayed on re-subscribe
    subscribe: Option<SubscribePayload>,
    tx: mpsc::Sender<Message>,
}

impl SidebarLink {
    /// Link over an existing outbound queue
    pub fn new(identity: SidebarIdentity, tx: mpsc::Sender<Message>) -> Self {
        Self {
            identity,
            subscribe: None,
            tx,
        }
    }

    /// Connect to the coordinator at `socket` and relay what it sends back
    /// to `conn`.
    ///
    /// Renders are also cached in `registry` for clients that connect later.
    pub async fn connect(
        socket: &Path,
        identity: SidebarIdentity,
        conn: Arc<ClientConn>,
        registry: Arc<ClientRegistry>,
    ) -> Result<Self> {
        let stream = UnixStream::connect(socket).await.map_err(|e| {
            if socket.exists() {
                PanoramaError::connection(e.to_string())
            } else {
                PanoramaError::CoordinatorNotRunning {
                    path: socket.to_path_buf(),
                }
            }
        })?;
        let (mut sink, mut source) = Framed::new(stream, MessageCodec::new()).split();
        let (tx, mut rx) = mpsc::channel::<Message>(LINK_QUEUE);

        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = sink.send(msg).await {
                    debug!(error = %e, "sidebar link write failed");
                    break;
                }
            }
            // Half-close so the coordinator hangs up and the reader ends
            let _ = sink.close().await;
        });

        let client_seq = conn.seq();
        tokio::spawn(async move {
            while let Some(item) = source.next().await {
                let msg = match item {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(client_seq, error = %e, "sidebar link read failed");
                        break;
                    }
                };
                if !relay(&registry, &conn, &msg).await {
                    break;
                }
            }
            debug!(client_seq, "sidebar link closed");
        });

        info!(%identity, "sidebar link connected");
        Ok(Self::new(identity, tx))
    }

    pub fn identity(&self) -> &SidebarIdentity {
        &self.identity
    }

    /// Forward a client's message under this link's identity
    pub async fn forward(&mut self, mut msg: Message) -> Result<()> {
        msg.client_id = self.identity.to_string();
        if let Payload::Subscribe(subscribe) = &mut msg.payload {
            subscribe.window_id = Some(self.identity.window_id.clone());
            self.subscribe = Some(subscribe.clone());
        }
        self.push(msg).await
    }

    /// Move the subscription to `window_id`.
    ///
    /// Returns `false` when the link already watches that window.
    pub async fn follow(&mut self, window_id: &str) -> Result<bool> {
        if self.identity.window_id == window_id {
            return Ok(false);
        }
        let old = self.identity.to_string();
        self.identity.window_id = window_id.to_string();
        info!(from = %old, to = %self.identity, "sidebar identity changed");

        self.push(Message::new(old, Payload::Unsubscribe)).await?;
        if let Some(subscribe) = self.subscribe.as_mut() {
            subscribe.window_id = Some(window_id.to_string());
            let msg = Message::new(self.identity.to_string(), Payload::Subscribe(subscribe.clone()));
            self.push(msg).await?;
        }
        Ok(true)
    }

    /// Best-effort unsubscribe
    pub async fn close(&self) {
        if self.subscribe.is_some() {
            let _ = self
                .push(Message::new(self.identity.to_string(), Payload::Unsubscribe))
                .await;
        }
    }

    async fn push(&self, msg: Message) -> Result<()> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| PanoramaError::ConnectionClosed)
    }
}

/// Pass one coordinator message to the network client; `false` once the
/// client is gone
async fn relay(registry: &ClientRegistry, conn: &ClientConn, msg: &Message) -> bool {
    let line = match msg.encode_line() {
        Ok(line) => line,
        Err(e) => {
            debug!(error = %e, "sidebar message not encodable");
            return true;
        }
    };
    if matches!(msg.payload, Payload::Render(_)) {
        registry.set_last_render(line.clone()).await;
    }
    registry.send_or_drop(conn, Outbound::Text(line)).await
}
