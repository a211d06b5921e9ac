//! Output pump: control-session events to network clients

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use panorama_protocol::Frame;
use panorama_utils::{PanoramaError, Result};

use crate::control::ControlEvent;
use crate::registry::{health_message, ClientRegistry, Outbound};

/// Deliver pane output until the control session ends or `cancel` fires.
///
/// Focus hints wake the reconciler through `focus_hint`. The end of the
/// control session cancels `cancel` so the whole bridge stops; a session
/// that ended with an error is returned as `ControlSession`.
pub async fn run_output_pump(
    mut events: mpsc::Receiver<ControlEvent>,
    registry: Arc<ClientRegistry>,
    focus_hint: Arc<Notify>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut outcome = Ok(());
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };
        match event {
            Some(ControlEvent::Output { pane_id, data }) => {
                deliver_output(&registry, &pane_id, data).await;
            }
            Some(ControlEvent::FocusHint) => focus_hint.notify_one(),
            Some(ControlEvent::Exit(reason)) => {
                match reason {
                    Some(reason) => {
                        error!(%reason, "control session ended");
                        outcome = Err(PanoramaError::ControlSession(reason));
                    }
                    None => info!("control session ended"),
                }
                cancel.cancel();
                break;
            }
            Some(ControlEvent::Reply(_)) => {}
            None => {
                warn!("control session event stream closed");
                cancel.cancel();
                break;
            }
        }
    }
    debug!("output pump stopped");
    outcome
}

/// Write one output chunk to every client attached to `pane_id`.
///
/// Returns the number of clients that received it.
pub async fn deliver_output(registry: &ClientRegistry, pane_id: &str, data: Vec<u8>) -> usize {
    let frame = match Frame::data(pane_id, data).encode() {
        Ok(frame) => frame,
        Err(e) => {
            warn!(%pane_id, error = %e, "unframeable output dropped");
            return 0;
        }
    };

    // A stalled client only delays itself
    let sends = registry.attached_to(pane_id).await.into_iter().map(|conn| {
        let frame = frame.clone();
        async move {
            if let Some(mode) = conn.note_stream() {
                if !registry.send_bridge_or_drop(&conn, &health_message(mode)).await {
                    return false;
                }
            }
            registry.send_or_drop(&conn, Outbound::Binary(frame)).await
        }
    });
    let delivered = join_all(sends).await.into_iter().filter(|ok| *ok).count();
    trace!(%pane_id, bytes = frame.len(), delivered, "output delivered");
    delivered
}
