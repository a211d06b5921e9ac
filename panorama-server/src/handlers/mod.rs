//! Message handlers for coordinator connections
//!
//! Routes each incoming [`Message`] to its handler; handlers describe what
//! should go back out as a [`HandlerResult`] and the connection task carries
//! it out.

mod input;

pub use input::Action;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use panorama_protocol::{Message, Payload, ResizePayload, SubscribePayload, ViewportPayload};

use crate::coordinator::Coordinator;
use crate::registry::ConnId;

/// Context for message handlers on one connection
pub struct HandlerContext {
    pub coordinator: Arc<Coordinator>,
    pub conn: ConnId,
    /// Outbound queue of this connection
    pub sender: mpsc::Sender<Message>,
}

/// Result of handling a message
#[derive(Debug, PartialEq)]
pub enum HandlerResult {
    /// Single reply on this connection
    Response(Message),
    /// Send a fresh frame to this subscriber only
    RenderSelf(String),
    /// The session was mutated; every subscriber gets a fresh frame
    Mutated,
    NoResponse,
}

impl HandlerContext {
    pub fn new(coordinator: Arc<Coordinator>, conn: ConnId, sender: mpsc::Sender<Message>) -> Self {
        Self {
            coordinator,
            conn,
            sender,
        }
    }

    /// Route a message to the appropriate handler
    pub async fn route_message(&self, msg: Message) -> HandlerResult {
        let client_id = msg.client_id;
        match msg.payload {
            Payload::Subscribe(payload) => self.handle_subscribe(client_id, payload),
            Payload::Unsubscribe => self.handle_unsubscribe(&client_id),
            Payload::Resize(payload) => self.handle_resize(client_id, payload),
            Payload::ViewportUpdate(payload) => self.handle_viewport(&client_id, payload),
            Payload::Input(input) => self.handle_input(&client_id, input).await,
            Payload::MenuSelect(select) => {
                self.apply_action(&client_id, &select.action, &select.target, None)
                    .await
            }
            Payload::Ping => HandlerResult::Response(Message::new(client_id, Payload::Pong)),
            Payload::Render(_) | Payload::Menu(_) | Payload::Pong => {
                debug!(%client_id, "ignoring coordinator-bound message of outbound type");
                HandlerResult::NoResponse
            }
        }
    }

    /// Carry out a handler result
    pub async fn dispatch(&self, result: HandlerResult) {
        match result {
            HandlerResult::Response(msg) => {
                if let Err(e) = self.sender.try_send(msg) {
                    warn!(conn = %self.conn, error = %e, "failed to queue response");
                }
            }
            HandlerResult::RenderSelf(client_id) => {
                if let Err(e) = self.coordinator.push_to(&client_id).await {
                    warn!(%client_id, error = %e, "render failed");
                }
            }
            HandlerResult::Mutated => {
                if let Err(e) = self.coordinator.push_all().await {
                    warn!(error = %e, "render after mutation failed");
                }
            }
            HandlerResult::NoResponse => {}
        }
    }

    fn handle_subscribe(&self, client_id: String, payload: SubscribePayload) -> HandlerResult {
        if client_id.is_empty() {
            warn!(conn = %self.conn, "subscribe without client_id ignored");
            return HandlerResult::NoResponse;
        }
        self.coordinator
            .registry()
            .subscribe(&client_id, self.conn, self.sender.clone(), &payload);
        HandlerResult::RenderSelf(client_id)
    }

    fn handle_unsubscribe(&self, client_id: &str) -> HandlerResult {
        self.coordinator.registry().unsubscribe(client_id);
        HandlerResult::NoResponse
    }

    fn handle_resize(&self, client_id: String, payload: ResizePayload) -> HandlerResult {
        if self
            .coordinator
            .registry()
            .resize(&client_id, payload.width, payload.height)
        {
            HandlerResult::RenderSelf(client_id)
        } else {
            debug!(%client_id, "resize for unknown subscriber");
            HandlerResult::NoResponse
        }
    }

    /// The client already scrolled locally; later frames carry the offset
    fn handle_viewport(&self, client_id: &str, payload: ViewportPayload) -> HandlerResult {
        self.coordinator
            .registry()
            .set_viewport(client_id, payload.viewport_offset);
        HandlerResult::NoResponse
    }
}
