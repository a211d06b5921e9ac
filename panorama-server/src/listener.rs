//! Unix socket listener for render clients

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use panorama_protocol::MessageCodec;
use panorama_utils::{PanoramaError, Result};

use crate::coordinator::Coordinator;
use crate::handlers::HandlerContext;

/// Bind the session socket.
///
/// A leftover socket file nobody answers on is removed first; a live one
/// means another coordinator owns the session. The socket is made `0o600`;
/// a missing parent directory is created `0o700`.
pub async fn bind_socket(path: &Path) -> Result<UnixListener> {
    if let Some(parent) = path.parent().filter(|p| !p.exists()) {
        std::fs::create_dir_all(parent).map_err(|e| PanoramaError::FileWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
        std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700))?;
    }

    if path.exists() {
        if UnixStream::connect(path).await.is_ok() {
            return Err(PanoramaError::connection(format!(
                "a coordinator is already listening on {}",
                path.display()
            )));
        }
        debug!(path = %path.display(), "removing stale socket");
        std::fs::remove_file(path)?;
    }

    let listener = UnixListener::bind(path)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    info!(path = %path.display(), "coordinator listening");
    Ok(listener)
}

/// Run the accept loop until cancelled
pub async fn run_accept_loop(
    listener: UnixListener,
    coordinator: Arc<Coordinator>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let coordinator = Arc::clone(&coordinator);
                        let cancel = cancel.clone();
                        tokio::spawn(async move {
                            handle_connection(stream, coordinator, cancel).await;
                        });
                    }
                    Err(e) => {
                        error!("accept error: {}", e);
                    }
                }
            }
            _ = cancel.cancelled() => {
                info!("shutdown requested, stopping accept loop");
                break;
            }
        }
    }
}

/// Serve one connection: decode messages, route them, and drain the
/// outbound queue onto the socket
pub async fn handle_connection(
    stream: UnixStream,
    coordinator: Arc<Coordinator>,
    cancel: CancellationToken,
) {
    let registry = Arc::clone(coordinator.registry());
    let conn = registry.next_conn_id();
    let (tx, mut rx) = mpsc::channel(coordinator.config().outbound_queue);
    let mut framed = Framed::new(stream, MessageCodec::new());
    let ctx = HandlerContext::new(coordinator, conn, tx);
    debug!(%conn, "connection opened");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            Some(msg) = rx.recv() => {
                if let Err(e) = framed.send(msg).await {
                    debug!(%conn, error = %e, "write failed");
                    break;
                }
            }

            frame = framed.next() => {
                match frame {
                    Some(Ok(msg)) => {
                        let result = ctx.route_message(msg).await;
                        ctx.dispatch(result).await;
                    }
                    Some(Err(e)) => {
                        warn!(%conn, error = %e, "closing connection on stream error");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    let removed = registry.remove_connection(conn);
    debug!(%conn, subscribers = removed.len(), "connection closed");
}
