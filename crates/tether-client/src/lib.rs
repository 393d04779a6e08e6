//! Client-side connection manager for Tether.
//!
//! A [`Client`] keeps one long-lived connection to a remote endpoint:
//!
//! - **Reconnect**: when the connection drops, the client redials with
//!   exponential [`Backoff`] until it succeeds, runs out of retries, or is
//!   disconnected.
//! - **Heartbeat**: a `{"type":"ping"}` is sent every
//!   [`ConnectConfig::heartbeat_interval`]; `pong` replies update
//!   [`Client::last_pong`].
//! - **Dispatch**: inbound envelopes are routed by `type` to handlers
//!   registered on the [`ClientBuilder`]. Handlers run on a bounded pool.
//!
//! ```no_run
//! use tether_client::{Client, ConnectConfig};
//!
//! # async fn run() -> Result<(), tether_client::ClientError> {
//! let client = Client::builder("ws://127.0.0.1:9000/ws")
//!     .config(ConnectConfig::default())
//!     .register_handler("chat", |writer, envelope| async move {
//!         writer.send(&envelope).await?;
//!         Ok::<_, tether_client::HandlerError>(())
//!     })
//!     .connect()
//!     .await?;
//!
//! client.wait().await;
//! # Ok(())
//! # }
//! ```

mod backoff;
mod client;
mod config;
mod error;
mod heartbeat;
mod signal;
mod writer;

pub use backoff::Backoff;
pub use client::{Client, ClientBuilder, ClientState};
pub use config::ConnectConfig;
pub use error::ClientError;
pub use signal::Signal;
pub use writer::ClientWriter;

pub use tether_protocol::{Envelope, HandlerError, HandlerResult};
