//! Remoting: message codec, request dispatch and client connection events.
//!
//! Sockets and connection management stay behind the [`Exchange`],
//! [`Server`] and [`Channel`] traits.

mod connection;
mod exchanger;
mod executor;
mod handler;
mod message;

pub use connection::{ClientConnectionHandler, ClientRegistry, ConnectIndexed};
pub use exchanger::{
    CallbackHandler, Channel, Exchange, Request, Response, Server, ServerSideExchanger,
};
pub use executor::BoundedExecutor;
pub use handler::{MessageHandler, MetaRequestHandler};
pub(crate) use message::{decode_message, encode_message, frame_message};
pub use message::{HeartbeatAck, MetaMessage, MigrateReply, SlotTableReply};
