//! Transport abstraction layer for Tether.
//!
//! Provides the [`Connection`], [`Dialer`] and [`Transport`] traits that
//! the client and server are written against. A connection is a duplex
//! message pipe: send a text frame, receive the next frame, close.
//! Read deadlines are applied by callers with `tokio::time::timeout`, so
//! the trait itself stays free of timer state.
//!
//! The traits use `async_trait` so they can be used as trait objects
//! (`Arc<dyn Connection>`); the server keeps a heterogeneous registry of
//! connections produced by different upgrade providers.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketDialer, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rand::Rng;

/// Identifier for an accepted connection.
///
/// Built from the wall clock plus a random suffix: `conn_<millis>_<suffix>`.
/// Collisions are possible in theory under very high accept rates, so treat
/// uniqueness as best effort.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Arc<str>);

impl ConnectionId {
    /// Creates a `ConnectionId` from an existing string.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh id from the current time and a random suffix.
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let suffix: u32 = rand::rng().random_range(0..100_000_000);
        Self(format!("conn_{millis}_{suffix:08}").into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One inbound message frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A UTF-8 text frame.
    Text(String),
    /// A binary frame.
    Binary(Vec<u8>),
}

impl Frame {
    /// The raw bytes of the frame regardless of its kind.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(data) => data,
        }
    }
}

/// A single connection that can send and receive message frames.
///
/// Implementations must allow `send_text` to be called concurrently with a
/// pending `recv`, and must serialize concurrent writers themselves.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Sends a text frame to the remote peer.
    async fn send_text(&self, text: String) -> Result<(), TransportError>;

    /// Receives the next data frame from the remote peer.
    ///
    /// Control frames are handled internally. Returns `Ok(None)` when the
    /// connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Frame>, TransportError>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), TransportError>;

    /// The remote address, when the transport knows it.
    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// Opens outbound connections.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Connects to `url` and returns the established connection.
    async fn dial(&self, url: &str) -> Result<Arc<dyn Connection>, TransportError>;
}

/// Accepts new incoming connections.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Waits for and accepts the next incoming connection, including any
    /// protocol upgrade handshake.
    async fn accept(&mut self) -> Result<Arc<dyn Connection>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_as_str() {
        let id = ConnectionId::new("conn_1");
        assert_eq!(id.as_str(), "conn_1");
        assert_eq!(id.to_string(), "conn_1");
    }

    #[test]
    fn test_connection_id_generate_has_prefix_and_suffix() {
        let id = ConnectionId::generate();
        let parts: Vec<&str> = id.as_str().split('_').collect();
        assert_eq!(parts.len(), 3, "unexpected id shape: {id}");
        assert_eq!(parts[0], "conn");
        assert!(parts[1].parse::<u128>().is_ok());
        assert_eq!(parts[2].len(), 8);
    }

    #[test]
    fn test_connection_id_generate_is_distinct_in_practice() {
        use std::collections::HashSet;
        let ids: HashSet<ConnectionId> =
            (0..1_000).map(|_| ConnectionId::generate()).collect();
        // Best-effort uniqueness: a handful of collisions out of 1000
        // would already indicate a broken generator.
        assert!(ids.len() > 990);
    }

    #[test]
    fn test_connection_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new("a"), "alice");
        map.insert(ConnectionId::new("b"), "bob");
        assert_eq!(map[&ConnectionId::new("a")], "alice");
    }

    #[test]
    fn test_frame_as_bytes() {
        assert_eq!(Frame::Text("hi".into()).as_bytes(), b"hi");
        assert_eq!(Frame::Binary(vec![1, 2]).as_bytes(), &[1, 2]);
    }
}
