//! Connection supervisor
//!
//! ```text
//! Disconnected ─▶ Connecting(1/M) ─fail─▶ Connecting(2/M) ─ … ─fail─▶ Unavailable
//!                      │                                                 │
//!                      └────────success──▶ Subscribed ◀── 'r' retry ─────┘
//!                                              │
//!                                  read EOF/error, reconnect delay
//!                                              ▼
//!                                         Disconnected
//! ```
//!
//! [`Link::next_event`] is cancel safe: every state change is committed
//! before it returns, so it can sit in a `select!` next to terminal input.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use panorama_protocol::{Message, Payload, SubscribePayload};
use panorama_utils::{PanoramaError, Result};

use super::Connection;
use crate::config::ClientConfig;

/// What the user sees about the coordinator connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    Disconnected,
    Connecting { attempt: u32, max: u32 },
    Subscribed,
    Unavailable { last_error: String },
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting { attempt, max } => {
                write!(f, "connecting (attempt {}/{})", attempt, max)
            }
            Self::Subscribed => write!(f, "connected"),
            Self::Unavailable { last_error } => {
                write!(f, "unavailable: {} (press r to retry)", last_error)
            }
        }
    }
}

#[derive(Debug)]
pub enum LinkEvent {
    /// The status changed
    Status(LinkStatus),
    /// A message arrived from the coordinator
    Message(Message),
}

/// Supervises the single live connection to the coordinator
pub struct Link {
    socket: PathBuf,
    client_id: String,
    subscribe: SubscribePayload,
    max_attempts: u32,
    backoff: Duration,
    reconnect_delay: Duration,
    status: LinkStatus,
    /// Failed attempts in the current cycle
    failures: u32,
    next_attempt: Option<Instant>,
    conn: Option<Connection>,
}

impl Link {
    /// A link that starts its first connection cycle immediately
    pub fn new(
        socket: PathBuf,
        client_id: impl Into<String>,
        subscribe: SubscribePayload,
        config: &ClientConfig,
    ) -> Self {
        Self {
            socket,
            client_id: client_id.into(),
            subscribe,
            max_attempts: config.connect_attempts.max(1),
            backoff: config.retry_backoff(),
            reconnect_delay: config.reconnect_delay(),
            status: LinkStatus::Disconnected,
            failures: 0,
            next_attempt: Some(Instant::now()),
            conn: None,
        }
    }

    pub fn status(&self) -> &LinkStatus {
        &self.status
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Record a new terminal size for future subscribes.
    ///
    /// Returns `false` when the size is unchanged.
    pub fn set_size(&mut self, width: u16, height: u16) -> bool {
        if self.subscribe.width == width && self.subscribe.height == height {
            return false;
        }
        self.subscribe.width = width;
        self.subscribe.height = height;
        true
    }

    /// Send `payload` under this client's id
    pub async fn send(&self, payload: Payload) -> Result<()> {
        match &self.conn {
            Some(conn) => conn.send(Message::new(self.client_id.clone(), payload)).await,
            None => Err(PanoramaError::ConnectionClosed),
        }
    }

    /// Start a fresh connection cycle after the link gave up
    pub fn retry_now(&mut self) -> bool {
        if !matches!(self.status, LinkStatus::Unavailable { .. }) {
            return false;
        }
        info!("manual reconnect requested");
        self.failures = 0;
        self.next_attempt = Some(Instant::now());
        self.status = LinkStatus::Disconnected;
        true
    }

    fn set_status(&mut self, status: LinkStatus) -> LinkEvent {
        debug!(%status, "link status");
        self.status = status.clone();
        LinkEvent::Status(status)
    }

    /// Wait for the next message or status change
    pub async fn next_event(&mut self) -> LinkEvent {
        if let Some(conn) = self.conn.as_mut() {
            if let Some(msg) = conn.recv().await {
                return LinkEvent::Message(msg);
            }
            warn!("coordinator connection lost");
            self.conn = None;
            self.failures = 0;
            self.next_attempt = Some(Instant::now() + self.reconnect_delay);
            return self.set_status(LinkStatus::Disconnected);
        }

        let Some(deadline) = self.next_attempt else {
            // Unavailable: nothing happens until retry_now()
            return std::future::pending().await;
        };
        tokio::time::sleep_until(deadline).await;

        let attempt = self.failures + 1;
        if !matches!(self.status, LinkStatus::Connecting { .. }) {
            return self.set_status(LinkStatus::Connecting {
                attempt,
                max: self.max_attempts,
            });
        }

        match self.dial().await {
            Ok(conn) => {
                info!(path = %conn.path().display(), attempt, "subscribed to coordinator");
                self.conn = Some(conn);
                self.failures = 0;
                self.next_attempt = None;
                self.set_status(LinkStatus::Subscribed)
            }
            Err(e) => {
                self.failures = attempt;
                if attempt >= self.max_attempts {
                    warn!(attempts = attempt, error = %e, "coordinator unavailable");
                    self.next_attempt = None;
                    return self.set_status(LinkStatus::Unavailable {
                        last_error: e.to_string(),
                    });
                }
                debug!(attempt, error = %e, "connect attempt failed");
                self.next_attempt = Some(Instant::now() + self.backoff);
                self.set_status(LinkStatus::Connecting {
                    attempt: attempt + 1,
                    max: self.max_attempts,
                })
            }
        }
    }

    async fn dial(&self) -> Result<Connection> {
        let conn = Connection::connect(&self.socket).await?;
        conn.send(Message::new(
            self.client_id.clone(),
            Payload::Subscribe(self.subscribe.clone()),
        ))
        .await?;
        Ok(conn)
    }

    /// Best-effort unsubscribe, then close
    pub async fn close(mut self) {
        if let Some(conn) = self.conn.take() {
            let _ = conn
                .send(Message::new(self.client_id.clone(), Payload::Unsubscribe))
                .await;
            conn.close().await;
        }
    }
}
