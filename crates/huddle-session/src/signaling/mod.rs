//! WebSocket link between one room client and the relay.
//!
//! One connection per room. The `join` announcement is written as soon as
//! the socket opens; after that the channel only moves already-encoded
//! [`SignalingMessage`](crate::protocol::SignalingMessage)s in and out.
//! There is no reconnect: when the socket ends the room is over.

mod client;
mod connection;
mod types;

pub use client::SignalingChannel;
pub use types::SignalingEvent;

pub(crate) use types::SignalingCommand;
