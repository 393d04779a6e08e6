use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tether_protocol::{Codec, JsonCodec};
use tether_transport::Connection;

use crate::ClientError;

/// Writes back on the connection a message arrived on.
///
/// Handlers receive one of these. If the client has reconnected since the
/// message was read, writes fail with a transport error instead of going
/// to the new connection.
#[derive(Clone)]
pub struct ClientWriter {
    conn: Arc<dyn Connection>,
}

impl ClientWriter {
    pub(crate) fn new(conn: Arc<dyn Connection>) -> Self {
        Self { conn }
    }

    /// Serializes `message` as JSON and sends it as one text frame.
    pub async fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<(), ClientError> {
        let text = JsonCodec.encode(message)?;
        self.conn.send_text(text).await?;
        Ok(())
    }
}

impl fmt::Debug for ClientWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientWriter")
            .field("peer", &self.conn.peer_addr())
            .finish()
    }
}
