//! Network client registry
//!
//! The client map and the cached last render live behind one
//! `tokio::sync::RwLock`. Broadcasts copy the matching clients out under the
//! read lock and write after releasing it. Writes to one client are
//! serialized by that client's own sink mutex and bounded by the write
//! timeout; a client whose write fails or times out is removed.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{Sink, SinkExt};
use parking_lot::Mutex;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use panorama_protocol::{BridgeMessage, Frame, PtyMode};
use panorama_utils::{PanoramaError, Result};

use crate::sidebar::SidebarLink;

/// One WebSocket message to a network client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Binary(Bytes),
    Text(String),
}

/// Write half of a network client's connection
pub type ClientSink = Pin<Box<dyn Sink<Outbound, Error = PanoramaError> + Send>>;

/// Pane a client is attached to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub pane_id: String,
    pub window_id: String,
}

#[derive(Debug)]
struct ClientState {
    attachment: Option<Attachment>,
    follow_focus: bool,
    /// SHA-256 of the last snapshot sent for the current attachment
    last_snapshot: Option<[u8; 32]>,
    mode: PtyMode,
    last_stream: Instant,
}

/// One connected network client
pub struct ClientConn {
    seq: u64,
    state: Mutex<ClientState>,
    sink: tokio::sync::Mutex<ClientSink>,
    write_timeout: Duration,
    sidebar: tokio::sync::Mutex<Option<SidebarLink>>,
}

impl std::fmt::Debug for ClientConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConn")
            .field("seq", &self.seq)
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl ClientConn {
    fn new(seq: u64, sink: ClientSink, write_timeout: Duration) -> Self {
        Self {
            seq,
            state: Mutex::new(ClientState {
                attachment: None,
                follow_focus: true,
                last_snapshot: None,
                mode: PtyMode::Streaming,
                last_stream: Instant::now(),
            }),
            sink: tokio::sync::Mutex::new(sink),
            write_timeout,
            sidebar: tokio::sync::Mutex::new(None),
        }
    }

    /// Per-connection sequence number, unique for the bridge's lifetime
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn attachment(&self) -> Option<Attachment> {
        self.state.lock().attachment.clone()
    }

    pub fn is_attached_to(&self, pane_id: &str) -> bool {
        self.state
            .lock()
            .attachment
            .as_ref()
            .is_some_and(|a| a.pane_id == pane_id)
    }

    /// Point the client at a pane; forgets the previous snapshot hash.
    ///
    /// Returns `false` when already attached there.
    pub fn attach(&self, pane_id: &str, window_id: &str) -> bool {
        let mut state = self.state.lock();
        let next = Attachment {
            pane_id: pane_id.to_string(),
            window_id: window_id.to_string(),
        };
        if state.attachment.as_ref() == Some(&next) {
            return false;
        }
        state.attachment = Some(next);
        state.last_snapshot = None;
        true
    }

    pub fn follows_focus(&self) -> bool {
        self.state.lock().follow_focus
    }

    pub fn set_follow_focus(&self, follow: bool) {
        self.state.lock().follow_focus = follow;
    }

    pub fn mode(&self) -> PtyMode {
        self.state.lock().mode
    }

    /// Record streamed output; returns the new mode if it changed
    pub fn note_stream(&self) -> Option<PtyMode> {
        let mut state = self.state.lock();
        state.last_stream = Instant::now();
        if state.mode == PtyMode::Streaming {
            return None;
        }
        state.mode = PtyMode::Streaming;
        Some(PtyMode::Streaming)
    }

    /// Time since output last streamed to this client
    pub fn quiet_for(&self) -> Duration {
        self.state.lock().last_stream.elapsed()
    }

    /// Switch to snapshot delivery; returns `false` if already there
    pub fn enter_snapshot_mode(&self) -> bool {
        let mut state = self.state.lock();
        if state.mode == PtyMode::Snapshot {
            return false;
        }
        state.mode = PtyMode::Snapshot;
        true
    }

    /// Remember `hash` as the last snapshot; `false` if it is unchanged
    pub fn record_snapshot(&self, hash: [u8; 32]) -> bool {
        let mut state = self.state.lock();
        if state.last_snapshot == Some(hash) {
            return false;
        }
        state.last_snapshot = Some(hash);
        true
    }

    /// The client's coordinator link, if it has one
    pub fn sidebar(&self) -> &tokio::sync::Mutex<Option<SidebarLink>> {
        &self.sidebar
    }

    /// Write one message within the write timeout
    pub async fn send(&self, message: Outbound) -> Result<()> {
        let mut sink = self.sink.lock().await;
        match tokio::time::timeout(self.write_timeout, sink.send(message)).await {
            Ok(result) => result,
            Err(_) => Err(PanoramaError::ConnectionTimeout {
                millis: self.write_timeout.as_millis() as u64,
            }),
        }
    }

    pub async fn send_frame(&self, frame: &Frame) -> Result<()> {
        self.send(Outbound::Binary(frame.encode()?)).await
    }

    pub async fn send_bridge(&self, message: &BridgeMessage) -> Result<()> {
        self.send(Outbound::Text(message.to_json()?)).await
    }

    /// Close the write half
    pub async fn close(&self) {
        let mut sink = self.sink.lock().await;
        let _ = tokio::time::timeout(self.write_timeout, sink.close()).await;
    }
}

/// `pty_health` for a delivery mode
pub fn health_message(mode: PtyMode) -> BridgeMessage {
    BridgeMessage::PtyHealth {
        mode,
        healthy: mode == PtyMode::Streaming,
    }
}

#[derive(Default)]
struct Inner {
    clients: HashMap<u64, Arc<ClientConn>>,
    last_render: Option<String>,
}

/// All connected network clients
pub struct ClientRegistry {
    inner: RwLock<Inner>,
    next_seq: AtomicU64,
    write_timeout: Duration,
}

impl ClientRegistry {
    pub fn new(write_timeout: Duration) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            next_seq: AtomicU64::new(1),
            write_timeout,
        }
    }

    /// Add a client writing to `sink`
    pub async fn register(&self, sink: ClientSink) -> Arc<ClientConn> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let conn = Arc::new(ClientConn::new(seq, sink, self.write_timeout));
        let mut inner = self.inner.write().await;
        inner.clients.insert(seq, Arc::clone(&conn));
        info!(client_seq = seq, clients = inner.clients.len(), "client registered");
        conn
    }

    /// Remove a client; `None` if it was already gone
    pub async fn remove(&self, seq: u64) -> Option<Arc<ClientConn>> {
        let mut inner = self.inner.write().await;
        let removed = inner.clients.remove(&seq);
        if removed.is_some() {
            info!(client_seq = seq, clients = inner.clients.len(), "client removed");
        }
        removed
    }

    pub async fn clients(&self) -> Vec<Arc<ClientConn>> {
        self.inner.read().await.clients.values().cloned().collect()
    }

    /// Clients currently attached to `pane_id`
    pub async fn attached_to(&self, pane_id: &str) -> Vec<Arc<ClientConn>> {
        self.inner
            .read()
            .await
            .clients
            .values()
            .filter(|c| c.is_attached_to(pane_id))
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.clients.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Cache the newest relayed render line
    pub async fn set_last_render(&self, line: String) {
        self.inner.write().await.last_render = Some(line);
    }

    pub async fn last_render(&self) -> Option<String> {
        self.inner.read().await.last_render.clone()
    }

    /// Write to one client, dropping it on failure.
    ///
    /// Returns whether the client is still connected.
    pub async fn send_or_drop(&self, conn: &ClientConn, message: Outbound) -> bool {
        match conn.send(message).await {
            Ok(()) => true,
            Err(e) => {
                warn!(client_seq = conn.seq(), error = %e, "write failed, dropping client");
                self.remove(conn.seq()).await;
                false
            }
        }
    }

    /// Send a bridge message, dropping the client on failure
    pub async fn send_bridge_or_drop(&self, conn: &ClientConn, message: &BridgeMessage) -> bool {
        match message.to_json() {
            Ok(json) => self.send_or_drop(conn, Outbound::Text(json)).await,
            Err(e) => {
                debug!(error = %e, "bridge message not encodable");
                true
            }
        }
    }
}
