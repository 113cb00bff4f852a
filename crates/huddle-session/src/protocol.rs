//! Wire protocol spoken with the room relay.
//!
//! Every frame is a JSON object tagged by `type`. Inbound frames are
//! decoded into the closed [`SignalingMessage`] union at the transport
//! boundary; anything that fails to decode never reaches the room.
//!
//! Peer negotiation messages (`offer`, `answer`, `ice-candidate`) carry a
//! `targetId` when sent and arrive with a `fromId` stamped by the relay.

use std::fmt;

use huddle_common::SignalingError;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Rooms
// ---------------------------------------------------------------------------

/// The two room variants. The variant is part of the relay address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoomKind {
    /// Audio-only full mesh.
    VoiceChat,
    /// Screen share, shared canvas and chat.
    Collaboration,
}

impl RoomKind {
    /// Path segment of the relay URL.
    pub fn path_segment(&self) -> &'static str {
        match self {
            RoomKind::VoiceChat => "voice",
            RoomKind::Collaboration => "collaboration",
        }
    }

    pub fn from_path_segment(segment: &str) -> Option<Self> {
        match segment {
            "voice" => Some(RoomKind::VoiceChat),
            "collaboration" => Some(RoomKind::Collaboration),
            _ => None,
        }
    }
}

/// Build the relay address for a room, e.g. `ws://host/voice/demo`.
pub fn room_url(server_url: &str, kind: RoomKind, room_id: &str) -> String {
    format!(
        "{}/{}/{}",
        server_url.trim_end_matches('/'),
        kind.path_segment(),
        room_id
    )
}

// ---------------------------------------------------------------------------
// Payload types
// ---------------------------------------------------------------------------

/// A room member as announced on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// An SDP blob with its role, shaped like `RTCSessionDescriptionInit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// A trickled ICE candidate, shaped like `RTCIceCandidateInit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, rename = "sdpMid")]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(
        default,
        rename = "usernameFragment",
        skip_serializing_if = "Option::is_none"
    )]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: Some("0".into()),
            sdp_m_line_index: Some(0),
            username_fragment: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawAction {
    Start,
    Move,
    Stop,
}

/// Canvas drawing tool. Names the canvas does not know are kept verbatim
/// and drawn like a pen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Tool {
    Pen,
    Marker,
    Highlighter,
    Eraser,
    Other(String),
}

impl Tool {
    pub fn as_str(&self) -> &str {
        match self {
            Tool::Pen => "pen",
            Tool::Marker => "marker",
            Tool::Highlighter => "highlighter",
            Tool::Eraser => "eraser",
            Tool::Other(name) => name,
        }
    }

    pub fn is_eraser(&self) -> bool {
        matches!(self, Tool::Eraser)
    }
}

impl From<String> for Tool {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pen" => Tool::Pen,
            "marker" => Tool::Marker,
            "highlighter" => Tool::Highlighter,
            "eraser" => Tool::Eraser,
            _ => Tool::Other(value),
        }
    }
}

impl From<&str> for Tool {
    fn from(value: &str) -> Self {
        Tool::from(value.to_string())
    }
}

impl From<Tool> for String {
    fn from(tool: Tool) -> Self {
        tool.as_str().to_string()
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a freehand stroke.
///
/// `start` carries the position and the brush; `move` only the position;
/// `stop` nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawEvent {
    pub action: DrawAction,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub tool: Option<Tool>,
    pub color: Option<String>,
    pub brush_size: Option<f64>,
}

impl DrawEvent {
    pub fn start(x: f64, y: f64, tool: Tool, color: &str, brush_size: f64) -> Self {
        Self {
            action: DrawAction::Start,
            x: Some(x),
            y: Some(y),
            tool: Some(tool),
            color: Some(color.to_string()),
            brush_size: Some(brush_size),
        }
    }

    pub fn moved(x: f64, y: f64) -> Self {
        Self {
            action: DrawAction::Move,
            x: Some(x),
            y: Some(y),
            tool: None,
            color: None,
            brush_size: None,
        }
    }

    pub fn stop() -> Self {
        Self {
            action: DrawAction::Stop,
            x: None,
            y: None,
            tool: None,
            color: None,
            brush_size: None,
        }
    }

    /// Both coordinates, if present.
    pub fn point(&self) -> Option<(f64, f64)> {
        Some((self.x?, self.y?))
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Every message exchanged with the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignalingMessage {
    /// First message on a new connection.
    #[serde(rename_all = "camelCase")]
    Join { room_id: String, user: UserInfo },

    /// Full roster, sent by the relay to a new member.
    Participants { participants: Vec<UserInfo> },

    UserJoined { user: UserInfo },

    #[serde(rename_all = "camelCase")]
    UserLeft {
        user_id: String,
        #[serde(default)]
        username: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    Chat {
        #[serde(default)]
        room_id: String,
        message: String,
        user: UserInfo,
    },

    #[serde(rename_all = "camelCase")]
    Draw {
        #[serde(default)]
        room_id: String,
        action: DrawAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        x: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        y: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool: Option<Tool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        brush_size: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_id: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    ClearCanvas {
        #[serde(default)]
        room_id: String,
    },

    #[serde(rename_all = "camelCase")]
    Offer {
        #[serde(default)]
        room_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_id: Option<String>,
        offer: SessionDescription,
    },

    #[serde(rename_all = "camelCase")]
    Answer {
        #[serde(default)]
        room_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_id: Option<String>,
        answer: SessionDescription,
    },

    #[serde(rename_all = "camelCase")]
    IceCandidate {
        #[serde(default)]
        room_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_id: Option<String>,
        candidate: IceCandidate,
    },

    #[serde(rename_all = "camelCase")]
    VoiceActivity {
        #[serde(default)]
        room_id: String,
        is_talking: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },
}

impl SignalingMessage {
    /// Decode one inbound frame.
    pub fn decode(text: &str) -> Result<Self, SignalingError> {
        serde_json::from_str(text).map_err(|e| SignalingError::Decode(e.to_string()))
    }

    /// Encode for the wire.
    pub fn encode(&self) -> Result<String, SignalingError> {
        serde_json::to_string(self).map_err(|e| SignalingError::Encode(e.to_string()))
    }

    /// The `type` tag.
    pub fn tag(&self) -> &'static str {
        match self {
            SignalingMessage::Join { .. } => "join",
            SignalingMessage::Participants { .. } => "participants",
            SignalingMessage::UserJoined { .. } => "user-joined",
            SignalingMessage::UserLeft { .. } => "user-left",
            SignalingMessage::Chat { .. } => "chat",
            SignalingMessage::Draw { .. } => "draw",
            SignalingMessage::ClearCanvas { .. } => "clear-canvas",
            SignalingMessage::Offer { .. } => "offer",
            SignalingMessage::Answer { .. } => "answer",
            SignalingMessage::IceCandidate { .. } => "ice-candidate",
            SignalingMessage::VoiceActivity { .. } => "voice-activity",
        }
    }

    /// Whether the relay must deliver this message to one member only.
    pub fn is_targeted(&self) -> bool {
        matches!(
            self,
            SignalingMessage::Offer { .. }
                | SignalingMessage::Answer { .. }
                | SignalingMessage::IceCandidate { .. }
        )
    }

    pub fn target_id(&self) -> Option<&str> {
        match self {
            SignalingMessage::Offer { target_id, .. }
            | SignalingMessage::Answer { target_id, .. }
            | SignalingMessage::IceCandidate { target_id, .. } => target_id.as_deref(),
            _ => None,
        }
    }

    /// Relay-stamped sender of a peer-to-peer message.
    pub fn from_id(&self) -> Option<&str> {
        match self {
            SignalingMessage::Offer { from_id, .. }
            | SignalingMessage::Answer { from_id, .. }
            | SignalingMessage::IceCandidate { from_id, .. }
            | SignalingMessage::Draw { from_id, .. } => from_id.as_deref(),
            SignalingMessage::VoiceActivity { user_id, .. } => user_id.as_deref(),
            _ => None,
        }
    }

    /// Stamp the sender id the way the relay does on delivery.
    pub fn stamp_sender(&mut self, sender: &str) {
        match self {
            SignalingMessage::Offer { from_id, .. }
            | SignalingMessage::Answer { from_id, .. }
            | SignalingMessage::IceCandidate { from_id, .. }
            | SignalingMessage::Draw { from_id, .. } => *from_id = Some(sender.to_string()),
            SignalingMessage::VoiceActivity { user_id, .. } => *user_id = Some(sender.to_string()),
            _ => {}
        }
    }

    pub fn draw(room_id: &str, event: DrawEvent) -> Self {
        SignalingMessage::Draw {
            room_id: room_id.to_string(),
            action: event.action,
            x: event.x,
            y: event.y,
            tool: event.tool,
            color: event.color,
            brush_size: event.brush_size,
            from_id: None,
        }
    }

    /// The canvas step carried by a `draw` message.
    pub fn draw_event(&self) -> Option<DrawEvent> {
        match self {
            SignalingMessage::Draw {
                action,
                x,
                y,
                tool,
                color,
                brush_size,
                ..
            } => Some(DrawEvent {
                action: *action,
                x: *x,
                y: *y,
                tool: tool.clone(),
                color: color.clone(),
                brush_size: *brush_size,
            }),
            _ => None,
        }
    }
}
