//! Error types for the client.

use std::time::Duration;

use tether_protocol::ProtocolError;
use tether_transport::TransportError;

/// Errors that can occur while connecting, sending or reading.
///
/// Only `connect()` and `send_message()` return these directly. Errors
/// raised inside background tasks (read failures, undecodable or unroutable
/// messages, retry exhaustion) are delivered to the `on_error` hook
/// instead, because there is no caller to return them to.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The [`ConnectConfig`](crate::ConnectConfig) failed validation.
    #[error("invalid config: {0}")]
    Config(String),

    /// There is no live connection right now (reconnecting or closed).
    #[error("not connected")]
    NotConnected,

    /// The client was disconnected while the operation was in flight.
    /// Seen by a reconnect attempt whose dial completed after
    /// `disconnect()`; the fresh socket is closed again.
    #[error("client closed")]
    Closed,

    /// Nothing arrived within the configured read timeout. The connection
    /// is treated as dead and, if enabled, redialed.
    #[error("no message received within {0:?}")]
    ReadTimeout(Duration),

    /// Dialing, writing or reading the socket failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The reconnect loop gave up after `max_reconnect_retries` failed
    /// attempts. The client is closed once this is reported.
    #[error("gave up after {attempts} reconnect attempts")]
    RetriesExhausted { attempts: u32 },
}
