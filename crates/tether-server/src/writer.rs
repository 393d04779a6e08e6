use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tether_protocol::{Codec, JsonCodec};
use tether_transport::{Connection, ConnectionId};

use crate::{BroadcastReport, Server, ServerError};

/// Handle given to server handlers: replies go to the connection the
/// message arrived on, broadcasts go to everyone.
#[derive(Clone)]
pub struct ServerWriter {
    id: ConnectionId,
    conn: Arc<dyn Connection>,
    server: Server,
}

impl ServerWriter {
    pub(crate) fn new(id: ConnectionId, conn: Arc<dyn Connection>, server: Server) -> Self {
        Self { id, conn, server }
    }

    /// The originating connection.
    pub fn connection_id(&self) -> &ConnectionId {
        &self.id
    }

    /// Serializes `message` as JSON and sends it to the originating
    /// connection.
    pub async fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<(), ServerError> {
        let text = JsonCodec.encode(message)?;
        self.conn.send_text(text).await?;
        Ok(())
    }

    /// Same as [`Server::broadcast`], the sender included.
    pub async fn broadcast<T: Serialize + ?Sized>(
        &self,
        message: &T,
    ) -> Result<BroadcastReport, ServerError> {
        self.server.broadcast(message).await
    }

    /// The server this connection belongs to, for [`Server::send_to`].
    pub fn server(&self) -> &Server {
        &self.server
    }
}

impl fmt::Debug for ServerWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerWriter")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
