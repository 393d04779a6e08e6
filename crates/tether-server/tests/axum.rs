//! The axum upgrade route drives the same dispatcher as `serve`.
#![cfg(feature = "axum")]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tether_server::{HandlerError, Server};
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn test_axum_route_dispatches_and_answers_ping() {
    let server = Server::builder()
        .register_handler("echo", |writer, envelope| async move {
            writer.send(&envelope).await?;
            Ok::<_, HandlerError>(())
        })
        .build();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = tether_server::axum::router(server.clone(), "/ws");
    tokio::spawn(async move { axum::serve(listener, app).await });

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("upgrade should succeed");

    ws.send(Message::text(r#"{"type":"ping"}"#)).await.unwrap();
    ws.send(Message::text(r#"{"type":"echo","code":7}"#)).await.unwrap();

    let mut replies = Vec::new();
    while replies.len() < 2 {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = frame {
            replies.push(text.as_str().to_owned());
        }
    }
    assert_eq!(replies, vec![r#"{"type":"pong"}"#, r#"{"type":"echo","code":7}"#]);
    assert_eq!(server.connection_count(), 1);

    ws.close(None).await.unwrap();
    for _ in 0..500 {
        if server.connection_count() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("connection was not unregistered");
}
