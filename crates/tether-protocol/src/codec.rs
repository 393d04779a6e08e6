//! Codec trait and the JSON implementation.
//!
//! A codec converts between Rust values and the text carried by a frame.
//! The client and server only see the [`Codec`] trait; [`JsonCodec`] is
//! the implementation they ship with.

use serde::{Serialize, de::DeserializeOwned};

use crate::{Envelope, ProtocolError};

/// Encodes values into text frames and decodes frame bytes back.
///
/// `encode` produces a `String` because every outbound message is sent as
/// a WebSocket text frame. `decode` takes bytes so binary frames can be
/// handed to it as well.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into frame text.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes frame bytes into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match `T`.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Decodes an inbound frame as an [`Envelope`].
    fn decode_envelope(&self, data: &[u8]) -> Result<Envelope, ProtocolError> {
        self.decode(data)
    }
}

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use tether_protocol::{Codec, Envelope, JsonCodec};
///
/// let text = JsonCodec.encode(&Envelope::ping()).unwrap();
/// assert_eq!(text, r#"{"type":"ping"}"#);
///
/// let env = JsonCodec.decode_envelope(text.as_bytes()).unwrap();
/// assert_eq!(env.msg_type, "ping");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
