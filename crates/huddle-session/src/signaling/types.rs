//! Event and command enums for the signaling channel.

use crate::protocol::SignalingMessage;

/// Events emitted by the signaling channel.
#[derive(Debug, Clone)]
pub enum SignalingEvent {
    /// Socket open and `join` written.
    Connected,
    /// A decoded inbound message.
    Message(SignalingMessage),
    /// Connect failure or socket error. Informational only.
    Error(String),
    /// The socket is gone. Emitted exactly once per connection.
    Disconnected,
}

/// Commands sent from the room to the connection task.
#[derive(Debug)]
pub(crate) enum SignalingCommand {
    /// An encoded frame to write.
    Send(String),
    Disconnect,
}
