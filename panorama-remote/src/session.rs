//! A live bridge connection driving an adapter

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use url::Url;

use panorama_protocol::Message;
use panorama_utils::{PanoramaError, Result};

use crate::adapter::{Outgoing, RemoteAdapter, Update};
use crate::widget::TerminalWidget;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An adapter bound to an open WebSocket
pub struct RemoteSession<W: TerminalWidget> {
    adapter: RemoteAdapter<W>,
    socket: Socket,
}

impl<W: TerminalWidget> RemoteSession<W> {
    /// Connect to a bridge's `/ws` endpoint.
    ///
    /// `url` carries the token as a query parameter, as printed on the
    /// pairing page.
    pub async fn connect(url: &Url, widget: W) -> Result<Self> {
        let (socket, response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| match e {
                tokio_tungstenite::tungstenite::Error::Http(response)
                    if response.status().as_u16() == 401 =>
                {
                    PanoramaError::Unauthorized(format!("bridge refused {}", url.path()))
                }
                other => PanoramaError::connection(other.to_string()),
            })?;
        info!(status = %response.status(), host = ?url.host_str(), "bridge connected");
        Ok(Self {
            adapter: RemoteAdapter::new(widget),
            socket,
        })
    }

    pub fn adapter(&self) -> &RemoteAdapter<W> {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut RemoteAdapter<W> {
        &mut self.adapter
    }

    /// Wait for the next message and apply it.
    ///
    /// Returns `None` once the bridge closes the connection. Messages that
    /// fail to decode are logged and skipped.
    pub async fn next_update(&mut self) -> Result<Option<Update>> {
        loop {
            let message = match self.socket.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => return Err(PanoramaError::connection(e.to_string())),
                None => return Ok(None),
            };
            let applied = match message {
                WsMessage::Binary(raw) => self.adapter.handle_binary(&raw),
                WsMessage::Text(text) => self.adapter.handle_text(text.as_str()),
                WsMessage::Close(_) => return Ok(None),
                _ => continue,
            };
            match applied {
                Ok(update) => return Ok(Some(update)),
                Err(e) => debug!(error = %e, "dropping undecodable message"),
            }
        }
    }

    pub async fn send_keys(&mut self, data: &[u8]) -> Result<()> {
        let out = self.adapter.key_input(data)?;
        self.send(out).await
    }

    pub async fn resize(&mut self, cols: u16, rows: u16) -> Result<()> {
        let out = self.adapter.resize(cols, rows)?;
        self.send(out).await
    }

    pub async fn attach(&mut self, pane_id: Option<&str>) -> Result<()> {
        let out = self.adapter.attach(pane_id)?;
        self.send(out).await
    }

    pub async fn send_sidebar(&mut self, msg: &Message) -> Result<()> {
        let out = self.adapter.sidebar_message(msg)?;
        self.send(out).await
    }

    async fn send(&mut self, out: Outgoing) -> Result<()> {
        let message = match out {
            Outgoing::Binary(raw) => WsMessage::Binary(raw),
            Outgoing::Text(text) => WsMessage::Text(text.into()),
        };
        self.socket
            .send(message)
            .await
            .map_err(|e| PanoramaError::connection(e.to_string()))
    }

    pub async fn close(mut self) -> Result<()> {
        self.socket
            .close(None)
            .await
            .map_err(|e| PanoramaError::connection(e.to_string()))
    }
}
