//! Integration tests for the Exowire server and client over real
//! WebSockets.

use std::time::Duration;

use exowire::exowire_protocol::handshake::{self, TEST_MESSAGE};
use exowire::prelude::*;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Starts a server that answers `Connect` with `Metadata` then `GameState`.
async fn start_server(config: HandshakeConfig) -> (String, oneshot::Sender<()>) {
    let server = ExowireServer::builder()
        .bind("127.0.0.1:0")
        .handshake(config)
        .build()
        .await
        .expect("should bind");
    let url = format!("ws://{}", server.local_addr().unwrap());
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    tokio::spawn(server.run_until(
        |session| {
            let sender = session.sender();
            session.on_message::<ClientMessage, _>(move |msg| {
                if let ClientMessage::Connect { nickname, .. } = msg {
                    sender.send_message(ServerMessage::Metadata {
                        id: nickname.len() as u64,
                        board_width: 5000.0,
                        board_height: 5000.0,
                    })?;
                    sender.send_message(ServerMessage::GameState {
                        flags: exosphere::game_flags::PLAYING,
                        tick: 0,
                        stage_length: 600,
                    })?;
                }
                Ok(())
            })?;
            Ok(())
        },
        async {
            let _ = stop_rx.await;
        },
    ));

    (url, stop_tx)
}

// =========================================================================
// Raw WebSocket client
// =========================================================================

#[tokio::test]
async fn test_server_sends_test_vector_on_open() {
    let (url, _stop) = start_server(HandshakeConfig::new(1)).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

    let msg = tokio::time::timeout(TIMEOUT, ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(msg.is_binary());

    let codec = exosphere::client_codec().unwrap();
    let frame = codec.decode(&msg.into_data()).unwrap();
    assert_eq!(frame.name, TEST_MESSAGE);
    assert!(handshake::verify(&frame.values, 1).passed());
}

#[tokio::test]
async fn test_garbage_closes_only_that_session() {
    let (url, _stop) = start_server(HandshakeConfig::default()).await;

    let (mut bad, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    bad.next().await.unwrap().unwrap(); // Test vector
    bad.send(Message::Binary(vec![200u8, 1, 2].into())).await.unwrap();

    // The server drops the desynchronised connection.
    let closed = tokio::time::timeout(TIMEOUT, async {
        loop {
            match bad.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "server should close a desynchronised session");

    // A fresh connection still works.
    let (mut good, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    let msg = tokio::time::timeout(TIMEOUT, good.next()).await.unwrap();
    assert!(msg.is_some());
}

// =========================================================================
// Session client
// =========================================================================

#[tokio::test]
async fn test_client_session_full_exchange() {
    let (url, _stop) = start_server(HandshakeConfig::new(1)).await;

    let mut client = exowire::connect(&url, exosphere::client_codec().unwrap())
        .await
        .expect("should connect");
    client.handshake(HandshakeConfig::new(1).strict());

    let (report_tx, mut reports) = mpsc::unbounded_channel();
    client.on_handshake(move |report| {
        let _ = report_tx.send(report.passed());
    });

    let (tx, mut received) = mpsc::unbounded_channel();
    let sender = client.sender();
    client
        .on_message::<ServerMessage, _>(move |msg| {
            let done = matches!(msg, ServerMessage::GameState { .. });
            tx.send(msg)?;
            if done {
                sender.close()?;
            }
            Ok(())
        })
        .unwrap();
    client.on_open(|sender| {
        sender
            .send_message(ClientMessage::Connect {
                nickname: "navigator".into(),
                password: String::new(),
            })
            .unwrap();
    });

    tokio::time::timeout(TIMEOUT, client.run())
        .await
        .expect("session should finish")
        .expect("session should close cleanly");

    assert_eq!(reports.recv().await, Some(true));
    assert_eq!(
        received.recv().await,
        Some(ServerMessage::Metadata {
            id: 9,
            board_width: 5000.0,
            board_height: 5000.0,
        })
    );
    assert!(received.recv().await.unwrap().has_flag(exosphere::game_flags::PLAYING));
}

#[tokio::test]
async fn test_strict_client_rejects_version_mismatch() {
    let (url, _stop) = start_server(HandshakeConfig::new(2)).await;

    let mut client = exowire::connect(&url, exosphere::client_codec().unwrap())
        .await
        .unwrap();
    client.handshake(HandshakeConfig::new(1).strict());

    let result = tokio::time::timeout(TIMEOUT, client.run()).await.unwrap();
    match result {
        Err(ExowireError::HandshakeRejected(report)) => {
            assert_eq!(report.peer_version(), Some(2));
        }
        other => panic!("expected HandshakeRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_stops_accepting_after_shutdown() {
    let (url, stop) = start_server(HandshakeConfig::default()).await;
    stop.send(()).unwrap();

    // Give the accept loop a moment to observe the signal.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let result = exowire::connect(&url, exosphere::client_codec().unwrap()).await;
    assert!(matches!(
        result,
        Err(ExowireError::Transport(TransportError::ConnectFailed { .. }))
    ));
}

#[tokio::test]
async fn test_connect_to_nothing_fails() {
    let server = ExowireServer::builder().bind("127.0.0.1:0").build().await.unwrap();
    let url = format!("ws://{}", server.local_addr().unwrap());
    drop(server);

    let result = exowire::connect(&url, exosphere::client_codec().unwrap()).await;
    assert!(result.is_err());
}
