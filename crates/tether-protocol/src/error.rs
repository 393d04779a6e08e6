//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding or routing messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into JSON).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, a missing or empty `type`,
    /// or a payload that doesn't match the handler's expected shape.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message is invalid at the protocol level.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// No handler is registered for the envelope's type.
    #[error("no handler registered for message type {0:?}")]
    UnknownType(String),

    /// A handler was registered twice for the same type.
    #[error("handler already registered for message type {0:?}")]
    DuplicateHandler(String),
}
