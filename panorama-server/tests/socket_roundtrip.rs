//! Coordinator round trip over a real Unix socket

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use panorama_mux::{FakeMultiplexer, MuxCommand};
use panorama_protocol::{
    ButtonKind, InputPayload, InputType, Message, MessageCodec, Payload, SubscribePayload,
};
use panorama_server::config::CoordinatorConfig;
use panorama_server::{listener, Coordinator, PlainRenderer};

async fn next_message(framed: &mut Framed<UnixStream, MessageCodec>) -> Message {
    tokio::time::timeout(Duration::from_secs(5), framed.next())
        .await
        .expect("timed out waiting for message")
        .expect("stream ended")
        .expect("decode failed")
}

fn render_of(msg: Message) -> panorama_protocol::RenderPayload {
    match msg.payload {
        Payload::Render(r) => r,
        other => panic!("expected render, got {:?}", other),
    }
}

#[tokio::test]
async fn test_subscribe_click_ping_over_socket() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coordinator.sock");

    let mux = Arc::new(FakeMultiplexer::two_windows());
    let coordinator = Arc::new(Coordinator::new(
        mux.clone(),
        Arc::new(PlainRenderer::new()),
        CoordinatorConfig::default(),
    ));
    let cancel = CancellationToken::new();
    let listener = listener::bind_socket(&path).await.unwrap();
    let server = tokio::spawn(listener::run_accept_loop(
        listener,
        Arc::clone(&coordinator),
        cancel.clone(),
    ));

    let stream = UnixStream::connect(&path).await.unwrap();
    let mut framed = Framed::new(stream, MessageCodec::new());

    // Subscribe and receive the first frame
    framed
        .send(Message::new(
            "sidebar-1",
            Payload::Subscribe(SubscribePayload {
                width: 30,
                height: 10,
                ..Default::default()
            }),
        ))
        .await
        .unwrap();
    let first = render_of(next_message(&mut framed).await);
    assert_eq!(first.sequence_number, 1);
    assert!(first.content.contains("one"));
    assert_eq!(first.pinned_content, "+ new window");

    // Click a window the client resolved itself
    let window_two = panorama_protocol::hit_test::resolve(&first.regions, 2, 0)
        .unwrap()
        .clone();
    framed
        .send(Message::new(
            "sidebar-1",
            Payload::Input(InputPayload {
                sequence_number: first.sequence_number,
                input_type: InputType::Mouse,
                button: Some(ButtonKind::Left),
                x: 0,
                y: 2,
                key: None,
                resolved_action: Some(window_two.action.clone()),
                resolved_target: Some(window_two.target.clone()),
            }),
        ))
        .await
        .unwrap();
    let second = render_of(next_message(&mut framed).await);
    assert_eq!(second.sequence_number, 2);
    assert_eq!(mux.commands(), vec![MuxCommand::SelectWindow("@2".into())]);

    // Keep-alive
    framed
        .send(Message::new("sidebar-1", Payload::Ping))
        .await
        .unwrap();
    let pong = next_message(&mut framed).await;
    assert_eq!(pong.payload, Payload::Pong);

    // Unsubscribe twice: the second is a no-op
    framed
        .send(Message::new("sidebar-1", Payload::Unsubscribe))
        .await
        .unwrap();
    framed
        .send(Message::new("sidebar-1", Payload::Unsubscribe))
        .await
        .unwrap();
    framed
        .send(Message::new("sidebar-1", Payload::Ping))
        .await
        .unwrap();
    assert_eq!(next_message(&mut framed).await.payload, Payload::Pong);
    assert!(coordinator.registry().is_empty());

    cancel.cancel();
    server.await.unwrap();
}

#[tokio::test]
async fn test_disconnect_removes_subscribers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coordinator.sock");

    let coordinator = Arc::new(Coordinator::new(
        Arc::new(FakeMultiplexer::two_windows()),
        Arc::new(PlainRenderer::new()),
        CoordinatorConfig::default(),
    ));
    let cancel = CancellationToken::new();
    let listener = listener::bind_socket(&path).await.unwrap();
    let server = tokio::spawn(listener::run_accept_loop(
        listener,
        Arc::clone(&coordinator),
        cancel.clone(),
    ));

    {
        let stream = UnixStream::connect(&path).await.unwrap();
        let mut framed = Framed::new(stream, MessageCodec::new());
        framed
            .send(Message::new("gone", Payload::Subscribe(SubscribePayload::default())))
            .await
            .unwrap();
        next_message(&mut framed).await;
        assert!(coordinator.registry().contains("gone"));
    }

    // Connection dropped; the coordinator notices EOF
    for _ in 0..50 {
        if coordinator.registry().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(coordinator.registry().is_empty());

    cancel.cancel();
    server.await.unwrap();
}
