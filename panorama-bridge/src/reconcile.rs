//! Reconciliation: focus following and snapshot fallback
//!
//! Live `%output` can stall or be missed, and focus can move without any
//! output at all. Every interval the reconciler moves focus-following
//! clients to the focused pane and repaints clients that have been quiet
//! for too long from a full capture. A capture is only sent when its
//! SHA-256 differs from the last one that client got.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use panorama_mux::{Focus, Multiplexer};
use panorama_protocol::{BridgeMessage, Frame, PtyMode};

use crate::control::PaneIo;
use crate::registry::{health_message, ClientConn, ClientRegistry, Outbound};

/// Shared by the reconciler and the WebSocket handler
#[derive(Clone)]
pub struct Reconciler {
    registry: Arc<ClientRegistry>,
    mux: Arc<dyn Multiplexer>,
    panes: Arc<dyn PaneIo>,
    quiet: Duration,
}

impl Reconciler {
    pub fn new(
        registry: Arc<ClientRegistry>,
        mux: Arc<dyn Multiplexer>,
        panes: Arc<dyn PaneIo>,
        quiet: Duration,
    ) -> Self {
        Self {
            registry,
            mux,
            panes,
            quiet,
        }
    }

    pub fn mux(&self) -> &dyn Multiplexer {
        self.mux.as_ref()
    }

    /// Tick every `interval`, and run an extra focus pass on each hint
    pub async fn run(self, interval: Duration, focus_hint: Arc<Notify>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.tick().await,
                _ = focus_hint.notified() => self.follow_focus().await,
            }
        }
        debug!("reconciler stopped");
    }

    /// One full pass over every client
    pub async fn tick(&self) {
        let focus = self.focus().await;
        for conn in self.registry.clients().await {
            if let Some(focus) = &focus {
                if self.follow(&conn, focus).await {
                    continue;
                }
            }
            if conn.quiet_for() > self.quiet {
                self.snapshot_quiet(&conn).await;
            }
        }
    }

    /// Move focus-following clients to the focused pane
    pub async fn follow_focus(&self) {
        let Some(focus) = self.focus().await else {
            return;
        };
        for conn in self.registry.clients().await {
            self.follow(&conn, &focus).await;
        }
    }

    /// Move one client to the focused pane if it follows focus
    pub async fn refocus(&self, conn: &ClientConn) {
        if let Some(focus) = self.focus().await {
            self.follow(conn, &focus).await;
        }
    }

    async fn focus(&self) -> Option<Focus> {
        match self.mux.focus().await {
            Ok(focus) => Some(focus),
            Err(e) => {
                debug!(error = %e, "focus query failed");
                None
            }
        }
    }

    /// Switch `conn` to `focus` if it follows focus and is elsewhere
    async fn follow(&self, conn: &ClientConn, focus: &Focus) -> bool {
        if !conn.follows_focus() || conn.is_attached_to(&focus.pane_id) {
            return false;
        }
        self.switch(conn, &focus.pane_id, &focus.window_id).await;
        true
    }

    /// Attach `conn` to a pane: `pane_switch`, sidebar re-subscribe, then a
    /// fresh snapshot of the new pane
    pub async fn switch(&self, conn: &ClientConn, pane_id: &str, window_id: &str) {
        if !conn.attach(pane_id, window_id) {
            return;
        }
        info!(client_seq = conn.seq(), %pane_id, %window_id, "client switched pane");

        let switch = BridgeMessage::PaneSwitch {
            pane_id: pane_id.to_string(),
            window_id: window_id.to_string(),
        };
        if !self.registry.send_bridge_or_drop(conn, &switch).await {
            return;
        }

        if let Some(link) = conn.sidebar().lock().await.as_mut() {
            if let Err(e) = link.follow(window_id).await {
                debug!(client_seq = conn.seq(), error = %e, "sidebar re-subscribe failed");
            }
        }

        self.snapshot(conn).await;
    }

    /// Quiet client: repaint if the screen changed, then report snapshot mode
    async fn snapshot_quiet(&self, conn: &ClientConn) {
        if !self.snapshot(conn).await {
            return;
        }
        if conn.enter_snapshot_mode() {
            debug!(client_seq = conn.seq(), "client fell back to snapshots");
            self.registry
                .send_bridge_or_drop(conn, &health_message(PtyMode::Snapshot))
                .await;
        }
    }

    /// Capture the attached pane and send it unless it matches the last
    /// snapshot. Returns `false` if the client is gone.
    pub async fn snapshot(&self, conn: &ClientConn) -> bool {
        let Some(attachment) = conn.attachment() else {
            return true;
        };
        let capture = match self.panes.capture(&attachment.pane_id).await {
            Ok(capture) => capture,
            Err(e) => {
                debug!(pane_id = %attachment.pane_id, error = %e, "capture failed");
                return true;
            }
        };

        let hash: [u8; 32] = Sha256::digest(&capture).into();
        if !conn.record_snapshot(hash) {
            trace!(client_seq = conn.seq(), "snapshot unchanged");
            return true;
        }
        trace!(
            client_seq = conn.seq(),
            hash = %hex::encode(&hash[..4]),
            "sending snapshot"
        );

        match Frame::snapshot(attachment.pane_id.as_str(), &capture).encode() {
            Ok(raw) => self.registry.send_or_drop(conn, Outbound::Binary(raw)).await,
            Err(e) => {
                debug!(error = %e, "snapshot not encodable");
                true
            }
        }
    }
}
