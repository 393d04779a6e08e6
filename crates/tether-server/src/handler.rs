//! Per-connection read loop and message dispatch.
//!
//! Each accepted connection gets its own Tokio task running [`run`]:
//!   1. Register the connection → get a `ConnectionId`
//!   2. Loop: receive frames → decode → dispatch by `type`
//!   3. On close or read error: unregister and close the socket
//!
//! Per-message failures (malformed JSON, unknown type, handler error) are
//! logged and reported; they never end the loop.

use std::sync::Arc;

use tether_protocol::{Codec, Envelope, JsonCodec};
use tether_transport::{Connection, ConnectionId, Frame};

use crate::{Server, ServerError, ServerWriter};

/// Runs one connection from registration to cleanup. Returns when the peer
/// closes or a read fails.
pub(crate) async fn run(server: Server, conn: Arc<dyn Connection>) {
    let state = Arc::clone(server.state());
    let guard = state.registry.register(Arc::clone(&conn));
    let conn_id = guard.id().clone();

    tracing::info!(
        %conn_id,
        peer = ?conn.peer_addr(),
        connections = state.registry.len(),
        "connection registered"
    );

    loop {
        match conn.recv().await {
            Ok(Some(Frame::Text(text))) => {
                dispatch(&server, &conn_id, &conn, text.as_bytes()).await;
            }
            Ok(Some(Frame::Binary(data))) => {
                tracing::warn!(%conn_id, len = data.len(), "ignoring binary frame");
            }
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        }
    }

    guard.deactivate();
    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close after read loop failed");
    }
    drop(guard);

    tracing::info!(%conn_id, connections = state.registry.len(), "connection unregistered");
}

/// Decodes one text frame and runs its handler to completion.
async fn dispatch(server: &Server, conn_id: &ConnectionId, conn: &Arc<dyn Connection>, data: &[u8]) {
    let state = server.state();

    let envelope: Envelope = match JsonCodec.decode_envelope(data) {
        Ok(envelope) => envelope,
        Err(e) => {
            let err = ServerError::from_decode(e);
            tracing::error!(%conn_id, error = %err, "failed to decode envelope");
            state.report(conn_id, &err);
            return;
        }
    };

    let Some(handler) = state.handlers.get(&envelope.msg_type) else {
        tracing::warn!(%conn_id, msg_type = %envelope.msg_type, "no handler registered");
        state.report(conn_id, &ServerError::UnknownType(envelope.msg_type));
        return;
    };

    let msg_type = envelope.msg_type.clone();
    tracing::debug!(%conn_id, msg_type = %msg_type, "dispatching");

    let writer = ServerWriter::new(conn_id.clone(), Arc::clone(conn), server.clone());
    if let Err(source) = handler(writer, envelope).await {
        let err = ServerError::Handler { msg_type, source };
        tracing::error!(%conn_id, error = %err, "handler failed");
        state.report(conn_id, &err);
    }
}
