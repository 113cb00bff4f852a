//! Client side of the Huddle real-time rooms.
//!
//! A room is driven by a [`RoomController`]: it owns the signaling channel
//! to the relay, the participant roster, one peer session per remote
//! participant, local capture state, voice activity detection, spatial
//! audio and the shared canvas. Platform media primitives are reached
//! through the [`MediaBackend`] capability trait supplied by the embedder.

pub mod canvas;
pub mod chat;
pub mod identity;
pub mod media;
pub mod membership;
pub mod peer;
pub mod protocol;
pub mod room;
pub mod signaling;
pub mod spatial;
pub mod vad;

#[cfg(test)]
pub(crate) mod testing;

pub use canvas::{CanvasSurface, CanvasSync, RecordingSurface};
pub use chat::{ChatHistory, ChatMessage};
pub use identity::Identity;
pub use media::{MediaBackend, MediaController, MediaStream, PeerConnection};
pub use membership::{MembershipTracker, Participant};
pub use peer::{NegotiationState, PeerConnectionManager, PeerSession};
pub use protocol::{RoomKind, SignalingMessage, UserInfo};
pub use room::{JoinOptions, LocalInput, RoomController, RoomEvent};
pub use signaling::{SignalingChannel, SignalingEvent};
pub use spatial::SpatialAudioRenderer;
pub use vad::VoiceActivityDetector;
