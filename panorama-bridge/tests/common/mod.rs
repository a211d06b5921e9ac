//! Shared harness: a bridge on 127.0.0.1 over a fake multiplexer

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use panorama_bridge::auth::Credentials;
use panorama_bridge::{pairing, server};
use panorama_bridge::{BridgeState, ClientRegistry, ControlError, PaneIo, Reconciler};
use panorama_mux::{FakeMultiplexer, Multiplexer};
use panorama_protocol::{BridgeMessage, Frame};

pub const TOKEN: &str = "0123456789abcdef";

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Pane I/O over the fake multiplexer, recording what the bridge sends
pub struct FakePanes {
    mux: Arc<FakeMultiplexer>,
    pub inputs: Mutex<Vec<(String, Vec<u8>)>>,
    pub resizes: Mutex<Vec<(u16, u16)>>,
}

#[async_trait]
impl PaneIo for FakePanes {
    async fn send_input(&self, pane_id: &str, data: &[u8]) -> Result<(), ControlError> {
        self.inputs.lock().push((pane_id.to_string(), data.to_vec()));
        Ok(())
    }

    async fn resize(&self, cols: u16, rows: u16) -> Result<(), ControlError> {
        self.resizes.lock().push((cols, rows));
        Ok(())
    }

    async fn capture(&self, pane_id: &str) -> Result<Vec<u8>, ControlError> {
        self.mux
            .capture_pane(pane_id)
            .await
            .map_err(|e| ControlError::CommandFailed(e.to_string()))
    }
}

pub struct Harness {
    pub addr: SocketAddr,
    pub mux: Arc<FakeMultiplexer>,
    pub panes: Arc<FakePanes>,
    pub registry: Arc<ClientRegistry>,
    pub reconciler: Reconciler,
    pub cancel: CancellationToken,
}

impl Harness {
    pub async fn start(coordinator_socket: Option<PathBuf>, quiet: Duration) -> Self {
        let mux = Arc::new(FakeMultiplexer::two_windows());
        mux.set_capture("%1", "screen one");
        mux.set_capture("%2", "screen two");
        let panes = Arc::new(FakePanes {
            mux: Arc::clone(&mux),
            inputs: Mutex::new(Vec::new()),
            resizes: Mutex::new(Vec::new()),
        });

        let registry = Arc::new(ClientRegistry::new(Duration::from_secs(1)));
        let reconciler = Reconciler::new(
            Arc::clone(&registry),
            Arc::clone(&mux) as Arc<dyn Multiplexer>,
            Arc::clone(&panes) as Arc<dyn PaneIo>,
            quiet,
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let state = BridgeState {
            registry: Arc::clone(&registry),
            reconciler: reconciler.clone(),
            panes: Arc::clone(&panes) as Arc<dyn PaneIo>,
            credentials: Arc::new(Credentials::new(TOKEN, None)),
            coordinator_socket,
            connect_url: pairing::connect_url(None, &addr.to_string(), TOKEN).unwrap(),
            cancel: cancel.clone(),
        };
        tokio::spawn(server::serve(listener, state));

        Self {
            addr,
            mux,
            panes,
            registry,
            reconciler,
            cancel,
        }
    }

    pub async fn connect(&self) -> Client {
        let url = format!("ws://{}/ws?token={}", self.addr, TOKEN);
        let (ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        ws
    }

    /// Connect and consume `hello` plus the first snapshot
    pub async fn connect_greeted(&self) -> (Client, BridgeMessage) {
        let mut ws = self.connect().await;
        let hello = next_bridge(&mut ws).await;
        let first = next_frame(&mut ws).await;
        assert!(first.is_snapshot());
        (ws, hello)
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Next data or text message, skipping keep-alives
pub async fn next_message(ws: &mut Client) -> WsMessage {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for message")
            .expect("connection ended")
            .expect("read failed");
        match msg {
            WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
            other => return other,
        }
    }
}

/// Nothing but keep-alives arrives within `wait`
pub async fn assert_silent(ws: &mut Client, wait: Duration) {
    if let Ok(Some(Ok(msg))) = tokio::time::timeout(wait, ws.next()).await {
        assert!(
            matches!(msg, WsMessage::Ping(_) | WsMessage::Pong(_)),
            "unexpected message {:?}",
            msg
        );
    }
}

pub async fn next_text(ws: &mut Client) -> String {
    match next_message(ws).await {
        WsMessage::Text(text) => text.as_str().to_string(),
        other => panic!("expected text, got {:?}", other),
    }
}

pub async fn next_bridge(ws: &mut Client) -> BridgeMessage {
    serde_json::from_str(&next_text(ws).await).unwrap()
}

pub async fn next_frame(ws: &mut Client) -> Frame {
    match next_message(ws).await {
        WsMessage::Binary(raw) => Frame::decode(&raw).unwrap(),
        other => panic!("expected binary, got {:?}", other),
    }
}

pub async fn send_text(ws: &mut Client, text: String) {
    ws.send(WsMessage::Text(text.into())).await.unwrap();
}

pub async fn send_frame(ws: &mut Client, frame: &Frame) {
    ws.send(WsMessage::Binary(frame.encode().unwrap())).await.unwrap();
}

/// Poll `check` until it holds or a few seconds pass
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never held");
}
