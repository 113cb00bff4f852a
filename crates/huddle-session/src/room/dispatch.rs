//! Inbound signaling and peer events.

use tracing::{debug, info, warn};

use super::{RoomController, RoomEvent};
use crate::chat::ChatMessage;
use crate::media::PeerEvent;
use crate::membership::{RosterChange, SessionAction};
use crate::peer::PeerNotice;
use crate::protocol::{RoomKind, SignalingMessage};
use crate::signaling::SignalingEvent;

impl RoomController {
    pub async fn handle_signaling_event(&mut self, event: SignalingEvent) {
        match event {
            SignalingEvent::Connected => {
                self.emit(RoomEvent::Joined {
                    room_id: self.room_id.clone(),
                    kind: self.kind,
                });
            }
            SignalingEvent::Message(message) => self.handle_message(message).await,
            SignalingEvent::Error(error) => {
                warn!(room_id = %self.room_id, error = %error, "Signaling error");
                if self.kind == RoomKind::Collaboration {
                    self.record_system(format!("Connection problem: {error}")).await;
                }
                self.emit(RoomEvent::Error(error));
            }
            SignalingEvent::Disconnected => {
                if self.closed {
                    return;
                }
                info!(room_id = %self.room_id, "Relay connection lost, leaving room");
                self.closed = true;
                self.teardown_local();
                self.membership.clear();
                self.emit(RoomEvent::Left);
            }
        }
    }

    /// Apply one message from the relay.
    pub async fn handle_message(&mut self, message: SignalingMessage) {
        if self.closed {
            return;
        }
        debug!(room_id = %self.room_id, kind = message.tag(), "Dispatch");

        match message {
            SignalingMessage::Join { .. } => {}

            SignalingMessage::Participants { participants } => {
                let change = self.membership.apply_roster(&participants, self.sharing);
                self.emit(RoomEvent::RosterChanged {
                    participants: self.membership.participants().to_vec(),
                });
                self.apply_change(change, false).await;
            }

            SignalingMessage::UserJoined { user } => {
                let change = self.membership.user_joined(&user, self.sharing);
                self.apply_change(change, true).await;
            }

            SignalingMessage::UserLeft { user_id, .. } => {
                let change = self.membership.user_left(&user_id);
                self.apply_change(change, true).await;
            }

            SignalingMessage::Chat { message, user, .. } => {
                if user.id == self.identity.id {
                    return;
                }
                let msg = ChatMessage::from_user(&user, &message);
                self.chat.push(msg.clone());
                self.emit(RoomEvent::Chat(msg));
            }

            ref draw @ SignalingMessage::Draw { .. } => {
                if self.kind != RoomKind::Collaboration {
                    return;
                }
                let from = draw.from_id().unwrap_or_default().to_string();
                if !from.is_empty() && self.membership.remote(&from).is_none() {
                    debug!(from_id = %from, "Draw from unknown participant");
                    return;
                }
                if let Some(event) = draw.draw_event() {
                    self.canvas.apply_remote(&from, &event);
                }
            }

            SignalingMessage::ClearCanvas { .. } => {
                if self.kind == RoomKind::Collaboration {
                    self.canvas.apply_remote_clear();
                }
            }

            SignalingMessage::Offer { from_id, offer, .. } => {
                let Some(from) = self.known_sender(from_id) else {
                    return;
                };
                let local = self.outbound_stream();
                if let Err(e) = self
                    .peers
                    .handle_inbound_offer(&from, offer, local.as_ref())
                    .await
                {
                    warn!(participant_id = %from, error = %e, "Could not answer offer");
                }
            }

            SignalingMessage::Answer {
                from_id, answer, ..
            } => {
                let Some(from) = self.known_sender(from_id) else {
                    return;
                };
                if let Err(e) = self.peers.handle_answer(&from, answer).await {
                    warn!(participant_id = %from, error = %e, "Could not apply answer");
                }
            }

            SignalingMessage::IceCandidate {
                from_id, candidate, ..
            } => {
                let Some(from) = self.known_sender(from_id) else {
                    return;
                };
                self.peers.handle_ice_candidate(&from, candidate).await;
            }

            SignalingMessage::VoiceActivity {
                is_talking,
                user_id,
                ..
            } => {
                let Some(user_id) = user_id else {
                    return;
                };
                if user_id != self.identity.id && self.membership.set_talking(&user_id, is_talking)
                {
                    self.emit(RoomEvent::TalkingChanged {
                        participant_id: user_id,
                        talking: is_talking,
                    });
                }
            }
        }
    }

    /// The sender id, if it names a remote member of the room.
    fn known_sender(&self, from_id: Option<String>) -> Option<String> {
        match from_id {
            Some(id) if self.membership.remote(&id).is_some() => Some(id),
            other => {
                debug!(from_id = ?other, "Ignoring message from unknown participant");
                None
            }
        }
    }

    async fn apply_change(&mut self, change: RosterChange, announce: bool) {
        let collaboration = self.kind == RoomKind::Collaboration;
        for participant in change.joined {
            if announce {
                if collaboration {
                    self.record_system(format!("{} joined the room", participant.username))
                        .await;
                }
                self.emit(RoomEvent::ParticipantJoined(participant));
            }
        }
        for participant in change.left {
            if collaboration {
                self.record_system(format!("{} left the room", participant.username))
                    .await;
            }
            self.emit(RoomEvent::ParticipantLeft(participant));
        }
        self.apply_actions(change.actions).await;
    }

    pub(super) async fn apply_actions(&mut self, actions: Vec<SessionAction>) {
        for action in actions {
            match action {
                SessionAction::Initiate(participant_id) => {
                    let local = self.outbound_stream();
                    if let Err(e) = self
                        .peers
                        .create_outbound_session(&participant_id, local.as_ref())
                        .await
                    {
                        warn!(participant_id = %participant_id, error = %e, "Could not start session");
                    }
                }
                SessionAction::Close(participant_id) => {
                    self.drop_participant(&participant_id);
                }
            }
        }
    }

    /// Release everything held for one remote participant.
    fn drop_participant(&mut self, participant_id: &str) {
        self.peers.close_session(participant_id);
        self.media.detach_remote_audio(participant_id);
        self.spatial.detach(participant_id);
        self.canvas.forget_sender(participant_id);
    }

    async fn record_system(&mut self, text: String) {
        let msg = ChatMessage::system(text);
        self.chat.push(msg.clone());
        self.emit(RoomEvent::Chat(msg));
    }

    pub async fn handle_peer_event(&mut self, event: PeerEvent) {
        if self.closed {
            return;
        }
        match self.peers.handle_peer_event(event).await {
            Some(PeerNotice::RemoteStream {
                participant_id,
                stream,
            }) => {
                if self.kind == RoomKind::VoiceChat {
                    if let Err(e) = self.media.attach_remote_audio(&participant_id, &stream) {
                        warn!(participant_id = %participant_id, error = %e, "Playback failed");
                    }
                    let count = self.membership.len();
                    let index = self.membership.index_of(&participant_id).unwrap_or(count);
                    if let Err(e) =
                        self.spatial
                            .attach(self.backend.as_ref(), &participant_id, index, count)
                    {
                        warn!(participant_id = %participant_id, error = %e, "Spatial audio failed");
                    }
                }
                self.emit(RoomEvent::RemoteStream {
                    participant_id,
                    stream,
                });
            }
            Some(PeerNotice::ConnectionFailed { participant_id }) => {
                self.emit(RoomEvent::PeerFailed { participant_id });
            }
            None => {}
        }
    }
}
