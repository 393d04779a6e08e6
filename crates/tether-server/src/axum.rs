//! Upgrade route for hosting a [`Server`] inside an axum application.
//!
//! ```rust,no_run
//! use tether_server::Server;
//!
//! # async fn run() -> std::io::Result<()> {
//! let server = Server::builder().build();
//! let app = tether_server::axum::router(server, "/ws");
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:9000").await?;
//! axum::serve(listener, app).await
//! # }
//! ```

use std::io::ErrorKind;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tether_transport::{Connection, Frame, TransportError};
use tokio::sync::Mutex;

use crate::Server;

/// A router with a single `GET path` route that upgrades to WebSocket and
/// hands the socket to `server`.
pub fn router(server: Server, path: &str) -> Router {
    Router::new().route(path, get(ws_upgrade)).with_state(server)
}

/// Axum handler performing the upgrade. Mount it on your own router when
/// the server needs to share state with other routes.
pub async fn ws_upgrade(State(server): State<Server>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| async move {
        server
            .handle_connection(Arc::new(AxumConnection::new(socket)))
            .await;
    })
}

/// An upgraded axum socket adapted to [`Connection`].
struct AxumConnection {
    sink: Mutex<SplitSink<WebSocket, Message>>,
    stream: Mutex<SplitStream<WebSocket>>,
}

impl AxumConnection {
    fn new(socket: WebSocket) -> Self {
        let (sink, stream) = socket.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }
}

#[async_trait]
impl Connection for AxumConnection {
    async fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.sink
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::SendFailed(std::io::Error::new(ErrorKind::BrokenPipe, e)))
    }

    async fn recv(&self) -> Result<Option<Frame>, TransportError> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(Frame::Text(text))),
                Some(Ok(Message::Binary(data))) => return Ok(Some(Frame::Binary(data))),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(std::io::Error::new(
                        ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| TransportError::SendFailed(std::io::Error::new(ErrorKind::BrokenPipe, e)))
    }
}
