//! The message envelope that travels on the wire.
//!
//! Every frame is a JSON object of the shape:
//!
//! ```json
//! { "type": "chat", "data": { "text": "hi" }, "timestamp": 1700000000000 }
//! ```
//!
//! Only `type` is required. The remaining fields are optional metadata
//! that the core never interprets; they are omitted from the output when
//! absent.

use serde::de::{self, DeserializeOwned, Deserializer, Unexpected};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::ProtocolError;

/// Reserved type for heartbeat requests.
pub const PING: &str = "ping";

/// Reserved type for heartbeat replies.
pub const PONG: &str = "pong";

/// One message on the wire.
///
/// `data` is kept as raw JSON (`Box<RawValue>`) so the envelope can be
/// routed on `type` alone; the handler decodes the payload into its own
/// type with [`Envelope::decode_data`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Selects the handler. Never empty on a decoded envelope.
    #[serde(rename = "type", deserialize_with = "non_empty_type")]
    pub msg_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Box<RawValue>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn non_empty_type<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let msg_type = String::deserialize(deserializer)?;
    if msg_type.is_empty() {
        return Err(de::Error::invalid_value(
            Unexpected::Str(&msg_type),
            &"a non-empty message type",
        ));
    }
    Ok(msg_type)
}

impl Envelope {
    /// Creates an envelope carrying only a type.
    pub fn new(msg_type: impl Into<String>) -> Self {
        Self {
            msg_type: msg_type.into(),
            data: None,
            timestamp: None,
            code: None,
            message: None,
        }
    }

    /// A heartbeat request: `{"type":"ping"}`.
    pub fn ping() -> Self {
        Self::new(PING)
    }

    /// A heartbeat reply: `{"type":"pong"}`.
    pub fn pong() -> Self {
        Self::new(PONG)
    }

    /// Attaches a payload, serialized to raw JSON immediately.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if `data` can't be serialized.
    pub fn with_data<T: Serialize + ?Sized>(mut self, data: &T) -> Result<Self, ProtocolError> {
        let raw = serde_json::value::to_raw_value(data).map_err(ProtocolError::Encode)?;
        self.data = Some(raw);
        Ok(self)
    }

    /// Sets `timestamp`. The unit is up to the application; the core never
    /// reads it.
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets `code`, e.g. an application status or error code.
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Decodes the payload into `T`.
    ///
    /// A missing payload decodes as JSON `null`, so `Option<T>` targets
    /// succeed with `None` and struct targets fail.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the payload doesn't match `T`.
    pub fn decode_data<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        let raw = self.data.as_deref().map_or("null", RawValue::get);
        serde_json::from_str(raw).map_err(ProtocolError::Decode)
    }

    /// Returns `true` for the reserved heartbeat types.
    pub fn is_heartbeat(&self) -> bool {
        self.msg_type == PING || self.msg_type == PONG
    }
}
