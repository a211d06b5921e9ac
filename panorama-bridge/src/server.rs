//! HTTP and WebSocket surface
//!
//! `/ws` carries one network client: binary frames for pane bytes, JSON text
//! for bridge control messages and relayed sidebar messages. `/connect`
//! serves the pairing page and `/health` a liveness probe. Every route sits
//! behind the loopback check.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::{future, SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use panorama_protocol::{BridgeMessage, ClientText, Frame, FrameType};
use panorama_utils::{PanoramaError, Result};

use crate::auth::{require_loopback, Credentials};
use crate::control::PaneIo;
use crate::pairing;
use crate::reconcile::Reconciler;
use crate::registry::{ClientConn, ClientRegistry, ClientSink, Outbound};
use crate::sidebar::{FocusTarget, SidebarIdentity, SidebarLink};

/// Everything a request handler needs
#[derive(Clone)]
pub struct BridgeState {
    pub registry: Arc<ClientRegistry>,
    pub reconciler: Reconciler,
    pub panes: Arc<dyn PaneIo>,
    pub credentials: Arc<Credentials>,
    /// Coordinator socket for sidebar links; `None` disables them
    pub coordinator_socket: Option<PathBuf>,
    pub connect_url: Url,
    pub cancel: CancellationToken,
}

pub fn router(state: BridgeState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/connect", get(connect_handler))
        .route("/health", get(health_handler))
        .layer(middleware::from_fn(require_loopback))
        .with_state(state)
}

/// Serve until `state.cancel` fires
pub async fn serve(listener: TcpListener, state: BridgeState) -> Result<()> {
    let cancel = state.cancel.clone();
    let addr = listener.local_addr()?;
    info!(%addr, "bridge listening");
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { cancel.cancelled().await })
    .await
    .map_err(PanoramaError::from)
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn connect_handler(State(state): State<BridgeState>) -> Response {
    match pairing::connect_page(&state.connect_url) {
        Ok(page) => Html(page).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn ws_handler(
    State(state): State<BridgeState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if let Err(e) = state.credentials.authorize(&headers, &query) {
        warn!(error = %e, "rejected WebSocket upgrade");
        return e.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn to_ws(message: Outbound) -> WsMessage {
    match message {
        Outbound::Binary(bytes) => WsMessage::Binary(bytes),
        Outbound::Text(text) => WsMessage::Text(text.into()),
    }
}

async fn handle_socket(socket: WebSocket, state: BridgeState) {
    let (sink, mut stream) = socket.split();
    let sink: ClientSink = Box::pin(
        sink.sink_map_err(|e| PanoramaError::connection(e.to_string()))
            .with(|message: Outbound| future::ready(Ok::<_, PanoramaError>(to_ws(message)))),
    );
    let conn = state.registry.register(sink).await;
    let seq = conn.seq();

    if !greet(&state, &conn).await {
        cleanup(&state, &conn).await;
        return;
    }

    loop {
        let message = tokio::select! {
            _ = state.cancel.cancelled() => break,
            message = stream.next() => message,
        };
        match message {
            Some(Ok(WsMessage::Binary(data))) => handle_binary(&state, &data).await,
            Some(Ok(WsMessage::Text(text))) => handle_text(&state, &conn, text.as_str()).await,
            Some(Ok(WsMessage::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                debug!(client_seq = seq, error = %e, "WebSocket read failed");
                break;
            }
        }
    }

    cleanup(&state, &conn).await;
}

/// Attach to the focused pane, open the sidebar link, then send `hello`,
/// the cached render and a first snapshot
async fn greet(state: &BridgeState, conn: &Arc<ClientConn>) -> bool {
    match state.reconciler.mux().focus().await {
        Ok(focus) => {
            conn.attach(&focus.pane_id, &focus.window_id);
        }
        Err(e) => warn!(error = %e, "no focus for new client"),
    }
    let attachment = conn.attachment();
    let (pane_id, window_id) = attachment
        .map(|a| (a.pane_id, a.window_id))
        .unwrap_or_default();

    if let Some(socket) = &state.coordinator_socket {
        let identity = SidebarIdentity::new(window_id.clone(), conn.seq());
        match SidebarLink::connect(
            socket,
            identity,
            Arc::clone(conn),
            Arc::clone(&state.registry),
        )
        .await
        {
            Ok(link) => *conn.sidebar().lock().await = Some(link),
            Err(e) => warn!(client_seq = conn.seq(), error = %e, "sidebar unavailable"),
        }
    }

    let hello = BridgeMessage::Hello {
        client_seq: conn.seq(),
        pane_id,
        window_id,
    };
    if !state.registry.send_bridge_or_drop(conn, &hello).await {
        return false;
    }
    if let Some(render) = state.registry.last_render().await {
        if !state.registry.send_or_drop(conn, Outbound::Text(render)).await {
            return false;
        }
    }
    state.reconciler.snapshot(conn).await
}

async fn cleanup(state: &BridgeState, conn: &ClientConn) {
    state.registry.remove(conn.seq()).await;
    let link = conn.sidebar().lock().await.take();
    if let Some(link) = link {
        link.close().await;
    }
    conn.close().await;
}

async fn handle_binary(state: &BridgeState, data: &[u8]) {
    let frame = match Frame::decode(data) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(error = %e, "dropping malformed frame");
            return;
        }
    };
    if frame.frame_type != FrameType::Input {
        trace!(pane_id = %frame.pane_id, "ignoring non-input frame from client");
        return;
    }
    if let Err(e) = state.panes.send_input(&frame.pane_id, &frame.payload).await {
        warn!(pane_id = %frame.pane_id, error = %e, "input not delivered");
    }
}

async fn handle_text(state: &BridgeState, conn: &ClientConn, text: &str) {
    let parsed = match ClientText::parse(text) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => {
            trace!("skipping unknown text message");
            return;
        }
        Err(e) => {
            debug!(error = %e, "dropping malformed text message");
            return;
        }
    };

    match parsed {
        ClientText::Bridge(BridgeMessage::Attach { pane_id: Some(pane_id) }) => {
            conn.set_follow_focus(false);
            match state.reconciler.mux().window_of_pane(&pane_id).await {
                Ok(window_id) => state.reconciler.switch(conn, &pane_id, &window_id).await,
                Err(e) => warn!(%pane_id, error = %e, "cannot attach"),
            }
        }
        ClientText::Bridge(BridgeMessage::Attach { pane_id: None }) => {
            conn.set_follow_focus(true);
            state.reconciler.refocus(conn).await;
        }
        ClientText::Bridge(BridgeMessage::PtyResize { cols, rows }) => {
            if let Err(e) = state.panes.resize(cols, rows).await {
                warn!(cols, rows, error = %e, "resize failed");
            }
        }
        ClientText::Bridge(other) => {
            debug!(?other, "ignoring bridge-to-client message from client");
        }
        ClientText::Sidebar(msg) => forward_sidebar(state, conn, msg).await,
    }
}

async fn forward_sidebar(state: &BridgeState, conn: &ClientConn, msg: panorama_protocol::Message) {
    let target = FocusTarget::of(&msg.payload);
    let mut guard = conn.sidebar().lock().await;
    let Some(link) = guard.as_mut() else {
        trace!(kind = %msg.message_type(), "no sidebar link, dropping");
        return;
    };

    if let Err(e) = link.forward(msg).await {
        warn!(client_seq = conn.seq(), error = %e, "sidebar link lost");
        *guard = None;
        return;
    }

    let Some(target) = target else {
        return;
    };
    match target.window(state.reconciler.mux()).await {
        Ok(window_id) => {
            if let Err(e) = link.follow(&window_id).await {
                debug!(error = %e, "sidebar re-subscribe failed");
            }
        }
        Err(e) => debug!(?target, error = %e, "cannot resolve focus target"),
    }
}
