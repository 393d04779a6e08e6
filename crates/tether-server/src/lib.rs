//! Server-side connection registry and dispatcher for Tether.
//!
//! A [`Server`] accepts many connections, routes each inbound envelope to
//! the handler registered for its `type`, answers `ping` with `pong`, and
//! can broadcast to every live connection.
//!
//! # Hosting
//!
//! - [`Server::serve`] runs an accept loop over any
//!   [`Transport`](tether_transport::Transport), e.g. a
//!   [`WebSocketTransport`](tether_transport::WebSocketTransport).
//! - [`Server::handle_connection`] drives one already-upgraded connection,
//!   for hosts that do the HTTP upgrade themselves.
//! - With the `axum` feature, [`axum::router`] mounts the upgrade route on
//!   an axum `Router`.
//!
//! # Feature Flags
//!
//! - `axum`: WebSocket upgrade route for axum 0.7

#[cfg(feature = "axum")]
pub mod axum;
mod error;
mod handler;
mod registry;
mod server;
mod writer;

pub use error::ServerError;
pub use server::{BroadcastReport, Server, ServerBuilder};
pub use writer::ServerWriter;

pub use tether_protocol::{Envelope, HandlerError, HandlerResult};
pub use tether_transport::ConnectionId;
