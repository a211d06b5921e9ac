//! End-to-end WebSocket behavior against a live bridge

mod common;

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite;

use common::*;
use panorama_bridge::fanout::deliver_output;
use panorama_protocol::{BridgeMessage, Frame, FrameType, PtyMode};

async fn http_get(addr: std::net::SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, addr
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

// ==================== HTTP ====================

#[tokio::test]
async fn test_health_endpoint() {
    let harness = Harness::start(None, Duration::from_secs(60)).await;
    let response = http_get(harness.addr, "/health").await;
    assert!(response.starts_with("HTTP/1.1 200"), "{}", response);
    assert!(response.ends_with("OK"));
}

#[tokio::test]
async fn test_connect_page_embeds_token() {
    let harness = Harness::start(None, Duration::from_secs(60)).await;
    let response = http_get(harness.addr, "/connect").await;
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("<svg"));
    assert!(response.contains(&format!("token={}", TOKEN)));
}

#[tokio::test]
async fn test_upgrade_without_token_is_rejected() {
    let harness = Harness::start(None, Duration::from_secs(60)).await;
    let url = format!("ws://{}/ws", harness.addr);
    match tokio_tungstenite::connect_async(url).await {
        Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 401),
        Err(other) => panic!("unexpected error {:?}", other),
        Ok(_) => panic!("upgrade without token accepted"),
    }

    let url = format!("ws://{}/ws?token=wrong", harness.addr);
    assert!(tokio_tungstenite::connect_async(url).await.is_err());
    assert!(harness.registry.is_empty().await);
}

// ==================== Greeting ====================

#[tokio::test]
async fn test_hello_then_snapshot_of_focused_pane() {
    let harness = Harness::start(None, Duration::from_secs(60)).await;
    let mut ws = harness.connect().await;

    assert_eq!(
        next_bridge(&mut ws).await,
        BridgeMessage::Hello {
            client_seq: 1,
            pane_id: "%1".into(),
            window_id: "@1".into(),
        }
    );
    let snapshot = next_frame(&mut ws).await;
    assert!(snapshot.is_snapshot());
    assert_eq!(snapshot.pane_id, "%1");
    assert!(snapshot.payload.ends_with(b"screen one"));
}

#[tokio::test]
async fn test_sequence_numbers_increase() {
    let harness = Harness::start(None, Duration::from_secs(60)).await;
    let (_first, hello1) = harness.connect_greeted().await;
    let (_second, hello2) = harness.connect_greeted().await;
    match (hello1, hello2) {
        (
            BridgeMessage::Hello { client_seq: a, .. },
            BridgeMessage::Hello { client_seq: b, .. },
        ) => assert!(b > a),
        other => panic!("expected hellos, got {:?}", other),
    }
    assert_eq!(harness.registry.len().await, 2);
}

// ==================== Client to pane ====================

#[tokio::test]
async fn test_input_frames_reach_pane() {
    let harness = Harness::start(None, Duration::from_secs(60)).await;
    let (mut ws, _) = harness.connect_greeted().await;

    send_frame(&mut ws, &Frame::input("%1", &b"ls\r"[..])).await;
    // Data frames from a client are not input
    send_frame(&mut ws, &Frame::data("%1", &b"nope"[..])).await;
    send_frame(&mut ws, &Frame::input("%1", &b"\x03"[..])).await;

    let panes = &harness.panes;
    eventually(|| panes.inputs.lock().len() == 2).await;
    assert_eq!(
        *panes.inputs.lock(),
        vec![
            ("%1".to_string(), b"ls\r".to_vec()),
            ("%1".to_string(), b"\x03".to_vec()),
        ]
    );
}

#[tokio::test]
async fn test_resize_request() {
    let harness = Harness::start(None, Duration::from_secs(60)).await;
    let (mut ws, _) = harness.connect_greeted().await;

    let resize = BridgeMessage::PtyResize { cols: 132, rows: 40 };
    send_text(&mut ws, resize.to_json().unwrap()).await;
    send_text(&mut ws, "{not json".to_string()).await;

    let panes = &harness.panes;
    eventually(|| !panes.resizes.lock().is_empty()).await;
    assert_eq!(*panes.resizes.lock(), vec![(132, 40)]);
}

// ==================== Pane to client ====================

#[tokio::test]
async fn test_output_goes_to_attached_clients_only() {
    let harness = Harness::start(None, Duration::from_secs(60)).await;
    let (mut ws, _) = harness.connect_greeted().await;

    assert_eq!(deliver_output(&harness.registry, "%2", b"other".to_vec()).await, 0);
    assert_eq!(deliver_output(&harness.registry, "%1", b"hi".to_vec()).await, 1);

    let frame = next_frame(&mut ws).await;
    assert_eq!(frame.frame_type, FrameType::Data);
    assert_eq!(frame.pane_id, "%1");
    assert_eq!(&frame.payload[..], b"hi");
}

#[tokio::test]
async fn test_explicit_attach_pins_client() {
    let harness = Harness::start(None, Duration::from_secs(60)).await;
    let (mut ws, _) = harness.connect_greeted().await;

    let attach = BridgeMessage::Attach {
        pane_id: Some("%2".into()),
    };
    send_text(&mut ws, attach.to_json().unwrap()).await;
    assert_eq!(
        next_bridge(&mut ws).await,
        BridgeMessage::PaneSwitch {
            pane_id: "%2".into(),
            window_id: "@2".into(),
        }
    );
    let snapshot = next_frame(&mut ws).await;
    assert!(snapshot.payload.ends_with(b"screen two"));

    // Focus stays on @1 but a pinned client is not moved back
    harness.reconciler.tick().await;
    assert_silent(&mut ws, Duration::from_millis(200)).await;

    // Back to following focus
    send_text(&mut ws, BridgeMessage::Attach { pane_id: None }.to_json().unwrap()).await;
    assert_eq!(
        next_bridge(&mut ws).await,
        BridgeMessage::PaneSwitch {
            pane_id: "%1".into(),
            window_id: "@1".into(),
        }
    );
    assert!(next_frame(&mut ws).await.is_snapshot());
}

#[tokio::test]
async fn test_stream_resumes_after_snapshot_mode() {
    let harness = Harness::start(None, Duration::from_millis(20)).await;
    let (mut ws, _) = harness.connect_greeted().await;

    tokio::time::sleep(Duration::from_millis(60)).await;
    harness.reconciler.tick().await;
    assert_eq!(
        next_bridge(&mut ws).await,
        BridgeMessage::PtyHealth {
            mode: PtyMode::Snapshot,
            healthy: false,
        }
    );

    deliver_output(&harness.registry, "%1", b"live".to_vec()).await;
    assert_eq!(
        next_bridge(&mut ws).await,
        BridgeMessage::PtyHealth {
            mode: PtyMode::Streaming,
            healthy: true,
        }
    );
    assert_eq!(&next_frame(&mut ws).await.payload[..], b"live");
}

#[tokio::test]
async fn test_disconnect_removes_client() {
    let harness = Harness::start(None, Duration::from_secs(60)).await;
    let (mut ws, _) = harness.connect_greeted().await;
    assert_eq!(harness.registry.len().await, 1);

    ws.close(None).await.unwrap();
    drop(ws);
    for _ in 0..200 {
        if harness.registry.is_empty().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("client never removed");
}
