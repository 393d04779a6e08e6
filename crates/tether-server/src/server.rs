//! `Server` builder, accept loop and fan-out.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use serde::Serialize;
use tether_protocol::{
    Codec, Envelope, HandlerError, HandlerRegistry, HandlerResult, JsonCodec, PING,
};
use tether_transport::{Connection, ConnectionId, Transport};

use crate::handler;
use crate::registry::ConnectionRegistry;
use crate::{ServerError, ServerWriter};

pub(crate) type ServerHandler =
    Arc<dyn Fn(ServerWriter, Envelope) -> BoxFuture<'static, HandlerResult> + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&ConnectionId, &ServerError) + Send + Sync>;

/// State shared by every connection task.
pub(crate) struct ServerState {
    pub(crate) handlers: HandlerRegistry<ServerHandler>,
    pub(crate) registry: Arc<ConnectionRegistry>,
    on_error: Option<ErrorHook>,
}

impl ServerState {
    pub(crate) fn report(&self, id: &ConnectionId, err: &ServerError) {
        if let Some(hook) = &self.on_error {
            hook(id, err);
        }
    }
}

/// Outcome of a [`Server::broadcast`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections the message was written to.
    pub delivered: usize,
    /// Connections whose write failed.
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Collects handlers, then freezes them into a [`Server`].
///
/// # Example
///
/// ```rust,no_run
/// use tether_server::{HandlerError, Server};
/// use tether_transport::WebSocketTransport;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let server = Server::builder()
///     .register_handler("chat", |writer, envelope| async move {
///         writer.broadcast(&envelope).await?;
///         Ok::<_, HandlerError>(())
///     })
///     .build();
///
/// let transport = WebSocketTransport::bind("0.0.0.0:9000").await?;
/// server.serve(transport).await;
/// # Ok(())
/// # }
/// ```
pub struct ServerBuilder {
    handlers: HandlerRegistry<ServerHandler>,
    on_error: Option<ErrorHook>,
}

impl ServerBuilder {
    /// A builder with no handlers and no error hook.
    pub fn new() -> Self {
        Self {
            handlers: HandlerRegistry::new(),
            on_error: None,
        }
    }

    /// Registers a handler for envelopes whose `type` is `msg_type`.
    ///
    /// Registering `"ping"` replaces the built-in pong reply.
    ///
    /// # Panics
    /// Panics if `msg_type` is empty or already has a handler.
    pub fn register_handler<F, Fut>(mut self, msg_type: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ServerWriter, Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let handler: ServerHandler =
            Arc::new(move |writer, envelope| handler(writer, envelope).boxed());
        self.handlers.register(msg_type, handler);
        self
    }

    /// Called for every per-message error, with the connection it came from.
    pub fn on_error(
        mut self,
        hook: impl Fn(&ConnectionId, &ServerError) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Freezes the handler table. Adds the default `ping` → `pong` handler
    /// unless one was registered.
    pub fn build(mut self) -> Server {
        if !self.handlers.contains(PING) {
            let pong: ServerHandler = Arc::new(|writer: ServerWriter, _envelope: Envelope| {
                async move {
                    writer.send(&Envelope::pong()).await?;
                    Ok::<_, HandlerError>(())
                }
                .boxed()
            });
            self.handlers.register(PING, pong);
        }

        tracing::debug!(handlers = ?self.handlers, "server built");
        Server {
            state: Arc::new(ServerState {
                handlers: self.handlers,
                registry: Arc::new(ConnectionRegistry::new()),
                on_error: self.on_error,
            }),
        }
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Accepts connections, dispatches their messages and fans out broadcasts.
///
/// Cheap to clone; clones share the registry and handlers.
#[derive(Clone)]
pub struct Server {
    state: Arc<ServerState>,
}

impl Server {
    /// Starts configuring a server. Same as [`ServerBuilder::new`].
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Accepts connections from `transport` forever, spawning a task per
    /// connection. Accept errors are logged and the loop continues.
    pub async fn serve<T: Transport>(&self, mut transport: T) {
        tracing::info!("tether server running");

        loop {
            match transport.accept().await {
                Ok(conn) => {
                    let server = self.clone();
                    tokio::spawn(async move { server.handle_connection(conn).await });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }

    /// Drives one upgraded connection until it closes: registers it, runs
    /// its read loop, then unregisters and closes it.
    pub async fn handle_connection(&self, conn: Arc<dyn Connection>) {
        handler::run(self.clone(), conn).await;
    }

    /// Sends `message` to every active connection.
    ///
    /// The message is encoded once. Writes run concurrently; a failed write
    /// is logged and counted but never stops the others.
    ///
    /// # Errors
    /// Only encoding can fail the broadcast as a whole.
    pub async fn broadcast<T: Serialize + ?Sized>(
        &self,
        message: &T,
    ) -> Result<BroadcastReport, ServerError> {
        let text = JsonCodec.encode(message)?;
        let targets = self.state.registry.snapshot();

        let mut sends: FuturesUnordered<_> = targets
            .into_iter()
            .map(|(id, conn)| {
                let text = text.clone();
                async move { (id, conn.send_text(text).await) }
            })
            .collect();

        let mut report = BroadcastReport::default();
        while let Some((id, result)) = sends.next().await {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(conn_id = %id, error = %e, "broadcast write failed");
                }
            }
        }

        tracing::debug!(delivered = report.delivered, failed = report.failed, "broadcast done");
        Ok(report)
    }

    /// Sends `message` to one connection.
    ///
    /// # Errors
    /// [`ServerError::UnknownConnection`] if `id` isn't live.
    pub async fn send_to<T: Serialize + ?Sized>(
        &self,
        id: &ConnectionId,
        message: &T,
    ) -> Result<(), ServerError> {
        let conn = self
            .state
            .registry
            .get(id)
            .ok_or_else(|| ServerError::UnknownConnection(id.clone()))?;
        let text = JsonCodec.encode(message)?;
        conn.send_text(text).await?;
        Ok(())
    }

    /// Number of connections whose read loop is still running, including
    /// ones currently being torn down.
    pub fn connection_count(&self) -> usize {
        self.state.registry.len()
    }

    /// IDs of the registered connections, in no particular order. The
    /// list is a snapshot; any of them may close right after.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.state.registry.ids()
    }

    pub(crate) fn state(&self) -> &Arc<ServerState> {
        &self.state
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("handlers", &self.state.handlers)
            .field("connections", &self.connection_count())
            .finish()
    }
}
