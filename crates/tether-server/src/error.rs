use tether_protocol::{HandlerError, ProtocolError};
use tether_transport::{ConnectionId, TransportError};

/// Errors reported by the server.
///
/// Per-message errors (`Decode`, `UnknownType`, `Handler`) never close the
/// connection; they are logged and passed to the `on_error` hook.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// An inbound frame was not a valid envelope.
    #[error("malformed message: {0}")]
    Decode(#[source] serde_json::Error),

    /// No handler is registered for the envelope's type.
    #[error("no handler registered for message type {0:?}")]
    UnknownType(String),

    /// A handler returned an error.
    #[error("handler for {msg_type:?} failed: {source}")]
    Handler {
        msg_type: String,
        #[source]
        source: HandlerError,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// `send_to` named a connection that isn't registered.
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),
}

impl ServerError {
    /// Lifts a codec failure, keeping malformed input distinct from other
    /// protocol errors.
    pub(crate) fn from_decode(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Decode(e) => Self::Decode(e),
            other => Self::Protocol(other),
        }
    }
}
