//! Wire protocol for Tether.
//!
//! This crate defines what travels between a client and a server and how
//! inbound messages find their handler:
//!
//! - **Envelope** ([`Envelope`]): the JSON object every message is
//!   wrapped in. Its `type` field selects the handler; `data` stays raw
//!   JSON until the handler decodes it.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how values are turned
//!   into text frames and back.
//! - **Registry** ([`HandlerRegistry`]): the type → handler table that
//!   both the client and the server build during setup.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between the transport (frames) and the
//! client/server (sessions). It knows nothing about sockets.
//!
//! ```text
//! Transport (Frame) → Protocol (Envelope) → Client / Server (handlers)
//! ```

mod codec;
mod envelope;
mod error;
mod registry;

pub use codec::{Codec, JsonCodec};
pub use envelope::{Envelope, PING, PONG};
pub use error::ProtocolError;
pub use registry::{HandlerError, HandlerRegistry, HandlerResult};
