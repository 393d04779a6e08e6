//! End-to-end tests: a Tether `Client` talking to a Tether `Server`.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether::prelude::*;
use tokio::sync::mpsc;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Chat {
    from: String,
    text: String,
}

// =========================================================================
// Helpers
// =========================================================================

async fn start(server: &Server) -> SocketAddr {
    let transport = WebSocketTransport::bind("127.0.0.1:0").await.unwrap();
    let addr = transport.local_addr().unwrap();
    let server = server.clone();
    tokio::spawn(async move { server.serve(transport).await });
    addr
}

fn chat_server() -> Server {
    Server::builder()
        .register_handler("echo", |writer, envelope| async move {
            writer.send(&envelope).await?;
            Ok::<_, HandlerError>(())
        })
        .register_handler("chat", |writer, envelope| async move {
            writer.broadcast(&envelope).await?;
            Ok::<_, HandlerError>(())
        })
        .build()
}

/// Connects a client that forwards every `msg_type` envelope to the
/// returned channel.
async fn collecting_client(
    addr: SocketAddr,
    msg_type: &str,
    config: ConnectConfig,
) -> (Client, mpsc::UnboundedReceiver<Envelope>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let client = Client::builder(format!("ws://{addr}"))
        .config(config)
        .register_handler(msg_type, move |_, envelope| {
            let _ = tx.send(envelope);
            async { Ok(()) }
        })
        .connect()
        .await
        .expect("client should connect");
    (client, rx)
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Envelope>) -> Envelope {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out")
        .expect("channel closed")
}

async fn eventually(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 5s");
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_client_round_trip_through_server() {
    let server = chat_server();
    let addr = start(&server).await;
    let (client, mut rx) = collecting_client(addr, "echo", ConnectConfig::default()).await;

    let sent = Envelope::new("echo")
        .with_data(&Chat {
            from: "ana".into(),
            text: "hi".into(),
        })
        .unwrap()
        .with_code(200);
    client.send_message(&sent).await.unwrap();

    let got = next(&mut rx).await;
    assert_eq!(got.msg_type, "echo");
    assert_eq!(got.code, Some(200));
    assert_eq!(
        got.decode_data::<Chat>().unwrap(),
        Chat {
            from: "ana".into(),
            text: "hi".into()
        }
    );

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_handler_broadcast_reaches_every_client() {
    let server = chat_server();
    let addr = start(&server).await;
    let (alice, mut alice_rx) = collecting_client(addr, "chat", ConnectConfig::default()).await;
    let (_bob, mut bob_rx) = collecting_client(addr, "chat", ConnectConfig::default()).await;
    eventually(|| server.connection_count() == 2).await;

    alice
        .send_message(&Envelope::new("chat").with_message("hello all"))
        .await
        .unwrap();

    assert_eq!(next(&mut alice_rx).await.message.as_deref(), Some("hello all"));
    assert_eq!(next(&mut bob_rx).await.message.as_deref(), Some("hello all"));
}

#[tokio::test]
async fn test_server_initiated_broadcast() {
    let server = chat_server();
    let addr = start(&server).await;
    let (_client, mut rx) = collecting_client(addr, "news", ConnectConfig::default()).await;
    eventually(|| server.connection_count() == 1).await;

    let report = server
        .broadcast(&Envelope::new("news").with_timestamp(1_700_000_000))
        .await
        .unwrap();

    assert_eq!(report, BroadcastReport { delivered: 1, failed: 0 });
    assert_eq!(next(&mut rx).await.timestamp, Some(1_700_000_000));
}

#[tokio::test]
async fn test_heartbeat_answered_by_server() {
    let server = chat_server();
    let addr = start(&server).await;
    let config = ConnectConfig {
        heartbeat_interval: Duration::from_millis(50),
        ..ConnectConfig::default()
    };
    let (client, _rx) = collecting_client(addr, "echo", config).await;

    assert!(client.last_pong().is_none());
    eventually(|| client.last_pong().is_some()).await;
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_client_disconnect_unregisters_on_server() {
    let server = chat_server();
    let addr = start(&server).await;
    let (client, _rx) = collecting_client(addr, "echo", ConnectConfig::default()).await;
    eventually(|| server.connection_count() == 1).await;

    client.disconnect().await.unwrap();
    client.wait().await;

    assert_eq!(client.state(), ClientState::Closed);
    eventually(|| server.connection_count() == 0).await;
}

#[tokio::test]
async fn test_errors_convert_into_tether_error() {
    async fn send_after_close(client: &Client) -> Result<(), TetherError> {
        client.send_message(&Envelope::new("echo")).await?;
        Ok(())
    }

    let server = chat_server();
    let addr = start(&server).await;
    let (client, _rx) = collecting_client(addr, "echo", ConnectConfig::default()).await;
    client.disconnect().await.unwrap();

    let err = send_after_close(&client).await.unwrap_err();
    assert!(matches!(err, TetherError::Client(ClientError::NotConnected)));
}
