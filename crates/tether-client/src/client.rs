//! The client connection manager.
//!
//! One [`Client`] owns at most one live connection plus three kinds of
//! background work:
//!
//! ```text
//!             ┌──────────────┐  frames   ┌───────────────┐  permit  ┌──────────────┐
//!  socket ───►│  read loop   ├──────────►│ dispatch      ├─────────►│ handler task │
//!             └──────┬───────┘           └───────────────┘          └──────────────┘
//!                    │ exit (error / timeout / close)
//!                    ▼
//!             ┌──────────────┐  dial + backoff
//!             │ reconnect    ├──────────────────► new read loop
//!             └──────────────┘
//!
//!             ┌──────────────┐
//!             │  heartbeat   ├──► {"type":"ping"} every interval
//!             └──────────────┘
//! ```
//!
//! Every suspension point (read, heartbeat tick, backoff sleep, waiting for
//! a pool permit) also waits on the shutdown [`Signal`], so
//! [`Client::disconnect`] stops all of them promptly.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde::Serialize;
use tether_protocol::{
    Codec, Envelope, HandlerRegistry, HandlerResult, JsonCodec, PING, ProtocolError,
};
use tether_transport::{Connection, Dialer, Frame, WebSocketDialer};
use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::{Backoff, ClientError, ClientWriter, ConnectConfig, Signal, heartbeat};

type ClientHandler =
    Arc<dyn Fn(ClientWriter, Envelope) -> BoxFuture<'static, HandlerResult> + Send + Sync>;
type LifecycleHook = Arc<dyn Fn() + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&ClientError) + Send + Sync>;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Where the client is in its lifecycle.
///
/// ```text
/// Disconnected → Connecting → Connected ⇄ Reconnecting
///                                 │            │
///                                 └──► Closed ◄┘
/// ```
///
/// `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientState {
    /// Built but not dialed yet.
    Disconnected,
    /// The initial dial is in flight.
    Connecting,
    /// A connection is live and its read loop is running.
    Connected,
    /// The connection dropped; the reconnect loop is dialing or waiting
    /// out a backoff delay.
    Reconnecting,
    /// Terminal. Reached through [`Client::disconnect`], retry exhaustion,
    /// a drop with reconnection disabled, or a failed initial dial.
    Closed,
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// The live connection and the state it implies. Swapped together under
/// one lock so readers never see a connection without its state.
struct Link {
    conn: Option<Arc<dyn Connection>>,
    state: ClientState,
    reconnect_enabled: bool,
}

#[derive(Default)]
struct Hooks {
    on_connect: Option<LifecycleHook>,
    on_disconnect: Option<LifecycleHook>,
    on_error: Option<ErrorHook>,
}

/// Why a read loop stopped.
enum ReadExit {
    Shutdown,
    RemoteClosed,
    Failed(ClientError),
}

struct Inner {
    url: String,
    config: ConnectConfig,
    dialer: Arc<dyn Dialer>,
    handlers: HandlerRegistry<ClientHandler>,
    hooks: Hooks,
    /// `None` when handlers run inline.
    pool: Option<Arc<Semaphore>>,
    link: Mutex<Link>,
    reconnecting: AtomicBool,
    /// Reset after every successful reconnect.
    backoff: Mutex<Backoff>,
    last_pong: Mutex<Option<Instant>>,
    shutdown: Signal,
    done: Signal,
}

/// Clears the reconnect re-entry flag when the loop returns.
struct ReconnectGuard<'a>(&'a AtomicBool);

impl Drop for ReconnectGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Configures handlers and hooks, then connects.
///
/// Handlers and hooks can only be set here: once [`connect`](Self::connect)
/// returns, the dispatch table is frozen.
pub struct ClientBuilder {
    url: String,
    config: ConnectConfig,
    dialer: Arc<dyn Dialer>,
    handlers: HandlerRegistry<ClientHandler>,
    hooks: Hooks,
}

impl ClientBuilder {
    fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            config: ConnectConfig::default(),
            dialer: Arc::new(WebSocketDialer),
            handlers: HandlerRegistry::new(),
            hooks: Hooks::default(),
        }
    }

    /// Replaces the default [`ConnectConfig`]. Validated by
    /// [`connect`](Self::connect), not here.
    pub fn config(mut self, config: ConnectConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers a handler for envelopes whose `type` is `msg_type`.
    ///
    /// `pong` and `ping` are consumed by the client itself, so handlers
    /// registered for them are never called.
    ///
    /// # Panics
    /// Panics if `msg_type` is empty or already has a handler.
    pub fn register_handler<F, Fut>(mut self, msg_type: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ClientWriter, Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let handler: ClientHandler = Arc::new(move |writer, envelope| handler(writer, envelope).boxed());
        self.handlers.register(msg_type, handler);
        self
    }

    /// Called every time a connection is established, including reconnects.
    pub fn on_connect(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.on_connect = Some(Arc::new(hook));
        self
    }

    /// Called every time a read loop ends, before any reconnect attempt.
    pub fn on_disconnect(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.on_disconnect = Some(Arc::new(hook));
        self
    }

    /// Called for read failures, undecodable or unroutable messages, and
    /// when the reconnect loop gives up.
    pub fn on_error(mut self, hook: impl Fn(&ClientError) + Send + Sync + 'static) -> Self {
        self.hooks.on_error = Some(Arc::new(hook));
        self
    }

    /// Replaces the default [`WebSocketDialer`].
    pub fn dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = dialer;
        self
    }

    /// Validates the config, dials, and starts the read loop and heartbeat.
    ///
    /// The initial dial is not retried: if it fails the error is returned
    /// and nothing keeps running.
    ///
    /// # Errors
    /// [`ClientError::Config`] if the config is invalid (nothing is dialed),
    /// otherwise the error from the first dial.
    pub async fn connect(self) -> Result<Client, ClientError> {
        self.config.validate()?;

        let inner = Arc::new(self.into_inner());
        inner.link.lock().state = ClientState::Connecting;

        let conn = match inner.establish().await {
            Ok(conn) => conn,
            Err(e) => {
                inner.link.lock().state = ClientState::Closed;
                inner.shutdown.fire();
                inner.done.fire();
                tracing::warn!(url = %inner.url, error = %e, "initial connect failed");
                return Err(e);
            }
        };
        inner.start_reading(conn);

        let client = Client { inner };
        tokio::spawn(heartbeat::run(
            client.clone(),
            client.inner.config.heartbeat_interval,
            client.inner.shutdown.clone(),
        ));
        Ok(client)
    }
}

impl ClientBuilder {
    /// Freezes the builder into the shared client state, not yet dialed.
    fn into_inner(self) -> Inner {
        let reconnect_enabled = self.config.reconnect_enabled;
        let pool = match self.config.handler_workers {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };
        let backoff = Backoff::new(
            self.config.reconnect_initial_delay,
            self.config.reconnect_max_delay,
        );

        Inner {
            url: self.url,
            config: self.config,
            dialer: self.dialer,
            handlers: self.handlers,
            hooks: self.hooks,
            pool,
            link: Mutex::new(Link {
                conn: None,
                state: ClientState::Disconnected,
                reconnect_enabled,
            }),
            reconnecting: AtomicBool::new(false),
            backoff: Mutex::new(backoff),
            last_pong: Mutex::new(None),
            shutdown: Signal::new(),
            done: Signal::new(),
        }
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("url", &self.url)
            .field("config", &self.config)
            .field("handlers", &self.handlers)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A persistent connection to one URL.
///
/// Cheap to clone; all clones drive the same connection. Dropping the last
/// handle does not stop the background tasks, call
/// [`disconnect`](Self::disconnect) for that.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// Starts configuring a client for `url` (`ws://` or `wss://`).
    ///
    /// Nothing is dialed until [`ClientBuilder::connect`].
    pub fn builder(url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(url)
    }

    /// Serializes `message` as JSON and sends it on the live connection.
    ///
    /// # Errors
    /// [`ClientError::NotConnected`] while reconnecting or after
    /// [`disconnect`](Self::disconnect); [`ClientError::Transport`] if the
    /// write fails.
    pub async fn send_message<T: Serialize + ?Sized>(&self, message: &T) -> Result<(), ClientError> {
        let conn = self.inner.current_conn().ok_or(ClientError::NotConnected)?;
        let text = JsonCodec.encode(message)?;
        conn.send_text(text).await?;
        Ok(())
    }

    /// `true` while a connection is live and messages can be sent.
    ///
    /// This is a snapshot: the connection can drop right after it returns,
    /// so callers still have to handle [`ClientError::NotConnected`] from
    /// [`send_message`](Self::send_message).
    pub fn is_connected(&self) -> bool {
        let link = self.inner.link.lock();
        link.state == ClientState::Connected && link.conn.is_some()
    }

    /// The current lifecycle state. See [`ClientState`] for the transitions.
    pub fn state(&self) -> ClientState {
        self.inner.link.lock().state
    }

    /// The URL every dial and redial goes to.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// When the last `pong` (or server `ping`) arrived.
    pub fn last_pong(&self) -> Option<Instant> {
        *self.inner.last_pong.lock()
    }

    /// Stops the client for good.
    ///
    /// Disables reconnection, stops the heartbeat, closes the live socket
    /// and completes [`wait`](Self::wait). Calling it again is a no-op.
    ///
    /// # Errors
    /// Returns the error from closing the socket, if any. The client is
    /// closed either way.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        let conn = {
            let mut link = self.inner.link.lock();
            link.reconnect_enabled = false;
            link.state = ClientState::Closed;
            link.conn.take()
        };
        let first = self.inner.shutdown.fire();

        let result = match conn {
            Some(conn) => conn.close().await.map_err(ClientError::from),
            None => Ok(()),
        };
        self.inner.done.fire();

        if first {
            tracing::info!(url = %self.inner.url, "client disconnected");
        }
        result
    }

    /// Resolves once the client is closed for good: after
    /// [`disconnect`](Self::disconnect), after the reconnect loop gives up,
    /// or when the connection drops with reconnection disabled.
    pub async fn wait(&self) {
        self.inner.done.wait().await;
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.inner.url)
            .field("state", &self.state())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Connection lifecycle
// ---------------------------------------------------------------------------

impl Inner {
    fn current_conn(&self) -> Option<Arc<dyn Connection>> {
        let link = self.link.lock();
        match link.state {
            ClientState::Connected => link.conn.clone(),
            _ => None,
        }
    }

    fn report(&self, err: &ClientError) {
        if let Some(hook) = &self.hooks.on_error {
            hook(err);
        }
    }

    /// Dials and installs the new connection as the live one.
    ///
    /// Fails with [`ClientError::Closed`] if the client was disconnected
    /// while the dial was in flight; the fresh socket is closed again.
    async fn establish(&self) -> Result<Arc<dyn Connection>, ClientError> {
        let conn = self.dialer.dial(&self.url).await?;

        let installed = {
            let mut link = self.link.lock();
            if link.state == ClientState::Closed {
                false
            } else {
                link.conn = Some(Arc::clone(&conn));
                link.state = ClientState::Connected;
                true
            }
        };
        if !installed {
            let _ = conn.close().await;
            return Err(ClientError::Closed);
        }

        tracing::info!(url = %self.url, "connected");
        if let Some(hook) = &self.hooks.on_connect {
            hook();
        }
        Ok(conn)
    }

    fn start_reading(self: &Arc<Self>, conn: Arc<dyn Connection>) {
        tokio::spawn(Arc::clone(self).read_loop(conn));
    }

    async fn read_loop(self: Arc<Self>, conn: Arc<dyn Connection>) {
        let read_timeout = self.config.read_timeout;
        let exit = loop {
            let result = tokio::select! {
                _ = self.shutdown.wait() => break ReadExit::Shutdown,
                result = tokio::time::timeout(read_timeout, conn.recv()) => result,
            };

            match result {
                Ok(Ok(Some(frame))) => self.handle_frame(&conn, frame).await,
                Ok(Ok(None)) => break ReadExit::RemoteClosed,
                Ok(Err(e)) => break ReadExit::Failed(ClientError::Transport(e)),
                Err(_) => break ReadExit::Failed(ClientError::ReadTimeout(read_timeout)),
            }
        };

        self.connection_lost(conn, exit).await;
    }

    async fn handle_frame(&self, conn: &Arc<dyn Connection>, frame: Frame) {
        let envelope = match JsonCodec.decode_envelope(frame.as_bytes()) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(url = %self.url, error = %e, "failed to decode message");
                self.report(&ClientError::Protocol(e));
                return;
            }
        };

        // Heartbeats prove liveness and never reach handlers.
        if envelope.is_heartbeat() {
            *self.last_pong.lock() = Some(Instant::now());
            tracing::trace!(msg_type = %envelope.msg_type, "heartbeat received");
            if envelope.msg_type == PING {
                if let Err(e) = ClientWriter::new(Arc::clone(conn)).send(&Envelope::pong()).await {
                    tracing::warn!(error = %e, "failed to answer server ping");
                }
            }
            return;
        }

        let Some(handler) = self.handlers.get(&envelope.msg_type).cloned() else {
            tracing::warn!(msg_type = %envelope.msg_type, "no handler registered");
            self.report(&ClientError::Protocol(ProtocolError::UnknownType(
                envelope.msg_type,
            )));
            return;
        };

        self.dispatch(handler, conn, envelope).await;
    }

    /// Runs `handler` on the pool, waiting for a free slot first, or inline
    /// when the pool is disabled.
    async fn dispatch(&self, handler: ClientHandler, conn: &Arc<dyn Connection>, envelope: Envelope) {
        let writer = ClientWriter::new(Arc::clone(conn));
        let msg_type = envelope.msg_type.clone();
        let task = async move {
            if let Err(e) = handler(writer, envelope).await {
                tracing::error!(msg_type = %msg_type, error = %e, "handler failed");
            }
        };

        let Some(pool) = &self.pool else {
            task.await;
            return;
        };

        let permit = tokio::select! {
            _ = self.shutdown.wait() => return,
            permit = Arc::clone(pool).acquire_owned() => permit,
        };
        match permit {
            Ok(permit) => {
                tokio::spawn(async move {
                    task.await;
                    drop(permit);
                });
            }
            // The semaphore is never closed.
            Err(_) => task.await,
        }
    }

    /// Tears down after a read loop ends and decides what comes next.
    async fn connection_lost(self: Arc<Self>, conn: Arc<dyn Connection>, exit: ReadExit) {
        let reconnect = {
            let mut link = self.link.lock();
            if link.conn.as_ref().is_some_and(|live| Arc::ptr_eq(live, &conn)) {
                link.conn = None;
            }
            match link.state {
                ClientState::Closed => false,
                _ if link.reconnect_enabled => {
                    link.state = ClientState::Reconnecting;
                    true
                }
                _ => {
                    link.state = ClientState::Closed;
                    false
                }
            }
        };
        let _ = conn.close().await;

        match &exit {
            ReadExit::Shutdown => tracing::debug!(url = %self.url, "read loop stopped"),
            ReadExit::RemoteClosed => tracing::info!(url = %self.url, "connection closed by remote"),
            ReadExit::Failed(e) => {
                tracing::warn!(url = %self.url, error = %e, "connection lost");
                self.report(e);
            }
        }
        if let Some(hook) = &self.hooks.on_disconnect {
            hook();
        }

        if self.shutdown.is_fired() {
            self.done.fire();
        } else if reconnect {
            self.reconnect_loop().await;
        } else {
            self.close_session();
        }
    }

    /// Marks the client closed and wakes everything waiting on it.
    fn close_session(&self) {
        self.link.lock().state = ClientState::Closed;
        self.shutdown.fire();
        if self.done.fire() {
            tracing::info!(url = %self.url, "client closed");
        }
    }

    /// Redials until success, retry exhaustion, or shutdown.
    ///
    /// The first attempt is immediate; each failure is followed by the next
    /// backoff delay. A successful reconnect resets the backoff, so the next
    /// outage starts again from the initial delay.
    async fn reconnect_loop(self: Arc<Self>) {
        if self.reconnecting.swap(true, Ordering::AcqRel) {
            tracing::debug!(url = %self.url, "reconnect already in progress");
            return;
        }
        let guard = ReconnectGuard(&self.reconnecting);

        loop {
            {
                let mut link = self.link.lock();
                if link.state == ClientState::Closed {
                    break;
                }
                link.state = ClientState::Reconnecting;
            }

            let attempt = self.backoff.lock().attempt() + 1;
            tracing::info!(url = %self.url, attempt, "reconnecting");

            match self.establish().await {
                Ok(conn) => {
                    self.backoff.lock().reset();
                    tracing::info!(url = %self.url, attempt, "reconnected");
                    drop(guard);
                    self.start_reading(conn);
                    return;
                }
                Err(ClientError::Closed) => break,
                Err(e) => {
                    if self.config.retries_exhausted(attempt) {
                        tracing::warn!(url = %self.url, attempts = attempt, error = %e, "giving up reconnecting");
                        self.report(&ClientError::RetriesExhausted { attempts: attempt });
                        self.close_session();
                        return;
                    }

                    let delay = self.backoff.lock().next_delay();
                    tracing::warn!(url = %self.url, attempt, ?delay, error = %e, "reconnect failed");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.shutdown.wait() => break,
                    }
                }
            }
        }

        // Disconnected while reconnecting.
        self.done.fire();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconnected_client_starts_disconnected() {
        let inner = Client::builder("ws://127.0.0.1:1").into_inner();

        let link = inner.link.lock();
        assert_eq!(link.state, ClientState::Disconnected);
        assert!(link.conn.is_none());
        assert!(link.reconnect_enabled);
        drop(link);

        assert_eq!(inner.backoff.lock().attempt(), 0);
        assert!(inner.pool.is_some());
    }

    #[test]
    fn test_disabled_pool_and_reconnect_carried_from_config() {
        let config = ConnectConfig {
            handler_workers: 0,
            reconnect_enabled: false,
            ..ConnectConfig::default()
        };
        let inner = Client::builder("ws://127.0.0.1:1").config(config).into_inner();

        assert!(inner.pool.is_none());
        assert!(!inner.link.lock().reconnect_enabled);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ClientState::Disconnected.to_string(), "disconnected");
        assert_eq!(ClientState::Reconnecting.to_string(), "reconnecting");
        assert_eq!(ClientState::Closed.to_string(), "closed");
    }
}
