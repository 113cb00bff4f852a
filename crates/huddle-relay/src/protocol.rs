//! Relay-side view of the wire protocol: which room a connection belongs
//! to, and who receives each message.

use huddle_session::protocol::{RoomKind, SignalingMessage};

/// Registry key: rooms with the same id but different kinds are distinct.
pub type RoomKey = (RoomKind, String);

/// Parse `/voice/{room}` or `/collaboration/{room}`.
pub fn parse_room_path(path: &str) -> Option<RoomKey> {
    let path = path.split('?').next().unwrap_or_default();
    let (kind, room) = path.trim_start_matches('/').split_once('/')?;
    let kind = RoomKind::from_path_segment(kind)?;
    let room = room.trim_end_matches('/');
    if room.is_empty() || room.contains('/') {
        return None;
    }
    Some((kind, room.to_string()))
}

/// Where a client message goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Only the named member.
    To(String),
    /// Every member except the sender.
    Others,
    /// Not forwarded.
    Drop,
}

/// Stamp the sender onto `message` and decide its recipients.
pub fn prepare(message: &mut SignalingMessage, sender: &str) -> Delivery {
    match message {
        // Relay-originated or handshake-only.
        SignalingMessage::Join { .. }
        | SignalingMessage::Participants { .. }
        | SignalingMessage::UserJoined { .. }
        | SignalingMessage::UserLeft { .. } => return Delivery::Drop,
        _ => {}
    }

    message.stamp_sender(sender);
    if !message.is_targeted() {
        return Delivery::Others;
    }
    match message.target_id() {
        Some(target) if target != sender => Delivery::To(target.to_string()),
        _ => Delivery::Drop,
    }
}
