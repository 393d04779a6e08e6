//! # Tether
//!
//! Persistent WebSocket sessions exchanging JSON envelopes.
//!
//! Tether has two halves that share one wire format
//! (`{"type": ..., "data": ..., ...}`):
//!
//! - [`Client`]: one long-lived connection that reconnects with
//!   exponential backoff, sends heartbeats and dispatches inbound envelopes
//!   to handlers on a bounded pool.
//! - [`Server`]: accepts many connections, routes each envelope to the
//!   handler registered for its `type`, answers `ping` with `pong`, and
//!   broadcasts to every live connection.
//!
//! The building blocks live in their own crates and are re-exported here:
//! [`transport`], [`protocol`], [`client`] and [`server`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tether::prelude::*;
//!
//! # async fn run() -> Result<(), TetherError> {
//! let server = Server::builder()
//!     .register_handler("chat", |writer, envelope| async move {
//!         writer.broadcast(&envelope).await?;
//!         Ok::<_, HandlerError>(())
//!     })
//!     .build();
//! let transport = WebSocketTransport::bind("127.0.0.1:9000").await?;
//! tokio::spawn(async move { server.serve(transport).await });
//!
//! let client = Client::builder("ws://127.0.0.1:9000")
//!     .register_handler("chat", |_writer, envelope| async move {
//!         println!("chat: {:?}", envelope.message);
//!         Ok(())
//!     })
//!     .connect()
//!     .await?;
//! client
//!     .send_message(&Envelope::new("chat").with_message("hello"))
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `axum`: WebSocket upgrade route for hosting a [`Server`] in axum 0.7

mod error;

pub use error::TetherError;

pub use tether_client as client;
pub use tether_protocol as protocol;
pub use tether_server as server;
pub use tether_transport as transport;

pub use tether_client::{Client, ClientBuilder, ClientState, ConnectConfig};
pub use tether_protocol::{Envelope, HandlerError, HandlerResult};
pub use tether_server::{BroadcastReport, Server, ServerBuilder};

/// Everything needed to run a client or a server.
pub mod prelude {
    pub use crate::TetherError;
    pub use tether_client::{
        Client, ClientBuilder, ClientError, ClientState, ClientWriter, ConnectConfig,
    };
    pub use tether_protocol::{Envelope, HandlerError, HandlerResult, PING, PONG};
    pub use tether_server::{BroadcastReport, Server, ServerBuilder, ServerError, ServerWriter};
    pub use tether_transport::{ConnectionId, WebSocketTransport};
}
