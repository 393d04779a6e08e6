//! Unified error type for the Tether crates.

use tether_client::ClientError;
use tether_protocol::ProtocolError;
use tether_server::ServerError;
use tether_transport::TransportError;

/// Wraps the error type of every Tether crate so application code can use
/// `?` across client, server and transport calls.
#[derive(Debug, thiserror::Error)]
pub enum TetherError {
    /// Connection, dial, send or receive failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encode, decode or registration failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Server(#[from] ServerError),
}
