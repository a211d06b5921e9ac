//! One coordinator socket and its I/O task

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

use panorama_protocol::{Message, MessageCodec};
use panorama_utils::{PanoramaError, Result};

const QUEUE_DEPTH: usize = 100;

/// How long [`Connection::close`] waits for queued messages to flush
const CLOSE_GRACE: Duration = Duration::from_millis(250);

/// Live connection to the coordinator.
///
/// Dropping it closes both queues, which ends the I/O task.
pub struct Connection {
    path: PathBuf,
    tx: mpsc::Sender<Message>,
    rx: mpsc::Receiver<Message>,
    task: JoinHandle<()>,
}

impl Connection {
    /// Connect to the coordinator socket at `path`
    pub async fn connect(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PanoramaError::CoordinatorNotRunning {
                path: path.to_path_buf(),
            });
        }

        let stream = UnixStream::connect(path).await.map_err(|e| {
            PanoramaError::Connection(format!("failed to connect to {}: {}", path.display(), e))
        })?;
        let framed = Framed::new(stream, MessageCodec::new());

        let (outgoing_tx, outgoing_rx) = mpsc::channel::<Message>(QUEUE_DEPTH);
        let (incoming_tx, incoming_rx) = mpsc::channel::<Message>(QUEUE_DEPTH);
        let task = tokio::spawn(Self::connection_task(framed, outgoing_rx, incoming_tx));

        tracing::debug!(path = %path.display(), "connected to coordinator");
        Ok(Self {
            path: path.to_path_buf(),
            tx: outgoing_tx,
            rx: incoming_rx,
            task,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn send(&self, msg: Message) -> Result<()> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| PanoramaError::ConnectionClosed)
    }

    /// Next message; `None` once the connection is gone
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Flush what is queued, then shut the socket
    pub async fn close(self) {
        let Self { tx, rx, mut task, .. } = self;
        drop(tx);
        drop(rx);
        if tokio::time::timeout(CLOSE_GRACE, &mut task).await.is_err() {
            task.abort();
        }
    }

    async fn connection_task(
        mut framed: Framed<UnixStream, MessageCodec>,
        mut outgoing: mpsc::Receiver<Message>,
        incoming: mpsc::Sender<Message>,
    ) {
        loop {
            tokio::select! {
                msg = outgoing.recv() => {
                    let Some(msg) = msg else {
                        // Owner closed the connection
                        break;
                    };
                    if let Err(e) = framed.send(msg).await {
                        tracing::debug!("failed to send message: {}", e);
                        break;
                    }
                }

                result = framed.next() => {
                    match result {
                        Some(Ok(msg)) => {
                            if incoming.send(msg).await.is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!("coordinator stream error: {}", e);
                            break;
                        }
                        None => {
                            tracing::info!("coordinator closed connection");
                            break;
                        }
                    }
                }
            }
        }
    }
}
