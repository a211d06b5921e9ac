//! Subscriber Registry
//!
//! Tracks the render clients subscribed on coordinator connections. Each
//! subscriber is keyed by its protocol `client_id` and owns its own frame
//! sequence, so frames for one subscriber are numbered independently of all
//! others.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use panorama_protocol::{
    ClickableRegion, ColorProfile, Message, Payload, RenderPayload, SubscribePayload,
};

/// Identifies one socket connection; a connection may carry several
/// subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(u64);

impl ConnId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Conn({})", self.0)
    }
}

/// Entry for a subscribed render client
pub struct Subscriber {
    pub conn: ConnId,
    /// Outbound queue of the owning connection
    pub sender: mpsc::Sender<Message>,
    pub width: u16,
    pub height: u16,
    pub color_profile: ColorProfile,
    /// Window identity the subscriber renders for
    pub window_id: Option<String>,
    pub viewport_offset: u32,
    /// Sequence number of the last frame sent; 0 before the first frame
    pub last_sequence: u64,
    pub total_lines: u32,
    pub regions: Vec<ClickableRegion>,
    pub pinned_regions: Vec<ClickableRegion>,
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("conn", &self.conn)
            .field("size", &(self.width, self.height))
            .field("window_id", &self.window_id)
            .field("last_sequence", &self.last_sequence)
            .field("sender_closed", &self.sender.is_closed())
            .finish()
    }
}

/// Copy of the subscriber fields a renderer needs
#[derive(Debug, Clone)]
pub struct SubscriberView {
    pub width: u16,
    pub height: u16,
    pub color_profile: ColorProfile,
    pub window_id: Option<String>,
    pub viewport_offset: u32,
}

/// Outcome of delivering one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent(u64),
    /// Queue full; the frame is superseded by the next one
    Dropped,
    /// Connection gone; the subscriber was removed
    Closed,
    UnknownSubscriber,
}

/// Registry of all subscribers
///
/// Thread-safe for concurrent access from connection tasks and the refresh
/// task.
pub struct SubscriberRegistry {
    subscribers: DashMap<String, Subscriber>,
    next_conn_id: AtomicU64,
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
            next_conn_id: AtomicU64::new(1),
        }
    }

    /// Allocate an id for a new socket connection
    pub fn next_conn_id(&self) -> ConnId {
        ConnId(self.next_conn_id.fetch_add(1, Ordering::SeqCst))
    }

    // ==================== Subscription ====================

    /// Register or replace a subscriber.
    ///
    /// Returns `true` when an existing subscription was replaced. A
    /// replacement starts a fresh sequence.
    pub fn subscribe(
        &self,
        client_id: &str,
        conn: ConnId,
        sender: mpsc::Sender<Message>,
        payload: &SubscribePayload,
    ) -> bool {
        let entry = Subscriber {
            conn,
            sender,
            width: payload.width,
            height: payload.height,
            color_profile: payload.color_profile,
            window_id: payload.window_id.clone(),
            viewport_offset: 0,
            last_sequence: 0,
            total_lines: 0,
            regions: Vec::new(),
            pinned_regions: Vec::new(),
        };
        let replaced = self.subscribers.insert(client_id.to_string(), entry).is_some();
        info!(client_id, %conn, replaced, "subscribed");
        replaced
    }

    /// Remove a subscriber; unknown ids are a no-op returning `false`
    pub fn unsubscribe(&self, client_id: &str) -> bool {
        let removed = self.subscribers.remove(client_id).is_some();
        if removed {
            info!(client_id, "unsubscribed");
        } else {
            debug!(client_id, "unsubscribe for unknown subscriber");
        }
        removed
    }

    /// Drop every subscriber owned by a closed connection
    pub fn remove_connection(&self, conn: ConnId) -> Vec<String> {
        let ids: Vec<String> = self
            .subscribers
            .iter()
            .filter(|e| e.conn == conn)
            .map(|e| e.key().clone())
            .collect();
        for id in &ids {
            self.subscribers.remove(id);
        }
        if !ids.is_empty() {
            debug!(%conn, count = ids.len(), "removed subscribers of closed connection");
        }
        ids
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.subscribers.contains_key(client_id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn client_ids(&self) -> Vec<String> {
        self.subscribers.iter().map(|e| e.key().clone()).collect()
    }

    // ==================== Subscriber State ====================

    pub fn resize(&self, client_id: &str, width: u16, height: u16) -> bool {
        match self.subscribers.get_mut(client_id) {
            Some(mut sub) => {
                sub.width = width;
                sub.height = height;
                true
            }
            None => false,
        }
    }

    pub fn set_viewport(&self, client_id: &str, offset: u32) -> bool {
        match self.subscribers.get_mut(client_id) {
            Some(mut sub) => {
                sub.viewport_offset = offset;
                true
            }
            None => false,
        }
    }

    pub fn view(&self, client_id: &str) -> Option<SubscriberView> {
        self.subscribers.get(client_id).map(|sub| SubscriberView {
            width: sub.width,
            height: sub.height,
            color_profile: sub.color_profile,
            window_id: sub.window_id.clone(),
            viewport_offset: sub.viewport_offset,
        })
    }

    pub fn last_sequence(&self, client_id: &str) -> Option<u64> {
        self.subscribers.get(client_id).map(|s| s.last_sequence)
    }

    /// Resolve a click against the regions of the last frame sent.
    ///
    /// Returns `None` unless `sequence` names that frame. Lines at or past
    /// the frame's `total_lines` address the pinned area.
    pub fn resolve_click(
        &self,
        client_id: &str,
        sequence: u64,
        line: u32,
        col: u32,
    ) -> Option<ClickableRegion> {
        let sub = self.subscribers.get(client_id)?;
        if sub.last_sequence == 0 || sub.last_sequence != sequence {
            return None;
        }
        if line >= sub.total_lines {
            panorama_protocol::hit_test::resolve(&sub.pinned_regions, line - sub.total_lines, col)
                .cloned()
        } else {
            panorama_protocol::hit_test::resolve(&sub.regions, line, col).cloned()
        }
    }

    // ==================== Delivery ====================

    /// Stamp the next sequence number on `frame` and queue it.
    ///
    /// The regions are recorded only when the frame was queued, so unresolved
    /// clicks are always checked against what the client can have seen.
    pub fn deliver(&self, client_id: &str, mut frame: RenderPayload) -> Delivery {
        {
            let Some(mut sub) = self.subscribers.get_mut(client_id) else {
                return Delivery::UnknownSubscriber;
            };
            let sequence = sub.last_sequence + 1;
            frame.sequence_number = sequence;
            frame.viewport_offset = sub.viewport_offset;
            let total_lines = frame.total_lines;
            let regions = frame.regions.clone();
            let pinned_regions = frame.pinned_regions.clone();

            let msg = Message::new(client_id, Payload::Render(frame));
            match sub.sender.try_send(msg) {
                Ok(()) => {
                    sub.last_sequence = sequence;
                    sub.total_lines = total_lines;
                    sub.regions = regions;
                    sub.pinned_regions = pinned_regions;
                    return Delivery::Sent(sequence);
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(client_id, "outbound queue full, dropping frame");
                    return Delivery::Dropped;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        // Entry guard released above; removing under it would deadlock
        self.subscribers.remove(client_id);
        debug!(client_id, "connection closed, subscriber removed");
        Delivery::Closed
    }

    /// Queue a non-render message to a subscriber
    pub fn send(&self, client_id: &str, msg: Message) -> bool {
        match self.subscribers.get(client_id) {
            Some(sub) => sub.sender.try_send(msg).is_ok(),
            None => false,
        }
    }
}
