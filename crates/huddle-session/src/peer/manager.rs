use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use huddle_common::{MediaError, SessionId};
use huddle_config::IceServer;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::types::{NegotiationState, PeerSession};
use crate::media::{
    MediaBackend, MediaStream, PeerConnectionState, PeerEvent, TrackHandle, TrackKind,
};
use crate::protocol::{IceCandidate, SessionDescription, SignalingMessage};
use crate::signaling::SignalingChannel;

/// Something the room has to act on after a peer event.
#[derive(Debug, Clone)]
pub enum PeerNotice {
    RemoteStream {
        participant_id: String,
        stream: MediaStream,
    },
    ConnectionFailed {
        participant_id: String,
    },
}

/// Owns every [`PeerSession`] in a room.
///
/// All negotiation runs on the room's task, so each method sees a settled
/// view of the sessions.
pub struct PeerConnectionManager {
    local_id: String,
    backend: Arc<dyn MediaBackend>,
    ice_servers: Vec<IceServer>,
    signaling: SignalingChannel,
    events_tx: mpsc::Sender<PeerEvent>,
    sessions: HashMap<String, PeerSession>,
    /// Candidates from participants with no session yet.
    orphan_candidates: HashMap<String, VecDeque<IceCandidate>>,
}

impl PeerConnectionManager {
    pub fn new(
        local_id: &str,
        backend: Arc<dyn MediaBackend>,
        ice_servers: Vec<IceServer>,
        signaling: SignalingChannel,
        events_tx: mpsc::Sender<PeerEvent>,
    ) -> Self {
        Self {
            local_id: local_id.to_string(),
            backend,
            ice_servers,
            signaling,
            events_tx,
            sessions: HashMap::new(),
            orphan_candidates: HashMap::new(),
        }
    }

    pub fn session(&self, participant_id: &str) -> Option<&PeerSession> {
        self.sessions.get(participant_id)
    }

    pub fn session_id(&self, participant_id: &str) -> Option<&SessionId> {
        self.sessions.get(participant_id).map(|s| &s.session_id)
    }

    pub fn participant_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn new_session(&mut self, participant_id: &str) -> Result<PeerSession, MediaError> {
        let session_id = SessionId::new();
        let connection = self.backend.create_peer_connection(
            participant_id,
            &session_id,
            &self.ice_servers,
            self.events_tx.clone(),
        )?;
        let mut session = PeerSession::new(participant_id, session_id, connection);
        if let Some(queued) = self.orphan_candidates.remove(participant_id) {
            session.pending_candidates = queued;
        }
        info!(
            participant_id = %participant_id,
            session_id = %session.session_id,
            "Peer session created"
        );
        Ok(session)
    }

    // -- outbound ------------------------------------------------------------

    /// Start a session towards `participant_id` and send it an offer.
    ///
    /// Any existing session for that participant is closed first.
    pub async fn create_outbound_session(
        &mut self,
        participant_id: &str,
        local: Option<&MediaStream>,
    ) -> Result<(), MediaError> {
        if participant_id == self.local_id {
            return Ok(());
        }
        if let Some(mut old) = self.sessions.remove(participant_id) {
            debug!(participant_id = %participant_id, "Replacing existing session");
            old.close();
        }

        let mut session = self.new_session(participant_id)?;
        let offer = match negotiate_offer(&mut session, local).await {
            Ok(offer) => offer,
            Err(e) => {
                warn!(participant_id = %participant_id, error = %e, "Offer failed");
                session.close();
                return Err(e);
            }
        };
        self.sessions.insert(participant_id.to_string(), session);

        self.signaling
            .send(&SignalingMessage::Offer {
                room_id: self.signaling.room_id().to_string(),
                target_id: Some(participant_id.to_string()),
                from_id: None,
                offer,
            })
            .await;
        Ok(())
    }

    // -- inbound -------------------------------------------------------------

    /// Apply a remote offer and answer it.
    ///
    /// Every offer comes from a fresh remote connection, so it always gets
    /// a fresh session; any previous one is closed. On glare the
    /// participant with the lexicographically smaller id keeps its own
    /// offer; the other side drops its offer and answers.
    pub async fn handle_inbound_offer(
        &mut self,
        from_id: &str,
        offer: SessionDescription,
        local: Option<&MediaStream>,
    ) -> Result<(), MediaError> {
        if from_id == self.local_id {
            return Ok(());
        }

        if let Some(existing) = self.sessions.get(from_id) {
            if existing.state == NegotiationState::Offering {
                if self.local_id.as_str() < from_id {
                    debug!(participant_id = %from_id, "Offer glare, keeping our offer");
                    return Ok(());
                }
                debug!(participant_id = %from_id, "Offer glare, yielding to remote offer");
            }
        }

        if let Some(mut old) = self.sessions.remove(from_id) {
            debug!(participant_id = %from_id, "Replacing session for new offer");
            old.close();
        }
        let session = self.new_session(from_id)?;
        self.sessions.insert(from_id.to_string(), session);

        let Some(session) = self.sessions.get_mut(from_id) else {
            return Ok(());
        };
        let answer = match negotiate_answer(session, offer, local).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(participant_id = %from_id, error = %e, "Answer failed");
                session.state = NegotiationState::Failed;
                return Err(e);
            }
        };

        self.signaling
            .send(&SignalingMessage::Answer {
                room_id: self.signaling.room_id().to_string(),
                target_id: Some(from_id.to_string()),
                from_id: None,
                answer,
            })
            .await;
        Ok(())
    }

    /// Apply the answer to our outstanding offer.
    pub async fn handle_answer(
        &mut self,
        from_id: &str,
        answer: SessionDescription,
    ) -> Result<(), MediaError> {
        let Some(session) = self.sessions.get_mut(from_id) else {
            debug!(participant_id = %from_id, "Answer for unknown session");
            return Ok(());
        };
        if session.state != NegotiationState::Offering {
            debug!(
                participant_id = %from_id,
                state = ?session.state,
                "Answer without outstanding offer"
            );
            return Ok(());
        }

        if let Err(e) = session.connection.set_remote_description(answer).await {
            warn!(participant_id = %from_id, error = %e, "Failed to apply answer");
            session.state = NegotiationState::Failed;
            return Err(e);
        }
        session.remote_description_set = true;
        flush_candidates(session).await;
        session.state = NegotiationState::Connected;
        debug!(participant_id = %from_id, "Answer applied");
        Ok(())
    }

    /// Apply a trickled candidate, or queue it until the remote
    /// description is in place.
    pub async fn handle_ice_candidate(&mut self, from_id: &str, candidate: IceCandidate) {
        let Some(session) = self.sessions.get_mut(from_id) else {
            self.orphan_candidates
                .entry(from_id.to_string())
                .or_default()
                .push_back(candidate);
            return;
        };

        if !session.remote_description_set {
            session.pending_candidates.push_back(candidate);
            return;
        }
        if let Err(e) = session.connection.add_ice_candidate(candidate).await {
            warn!(participant_id = %from_id, error = %e, "Failed to add ICE candidate");
        }
    }

    /// React to an event from one of our connections.
    pub async fn handle_peer_event(&mut self, event: PeerEvent) -> Option<PeerNotice> {
        let participant_id = event.participant_id().to_string();
        let Some(session) = self.sessions.get_mut(&participant_id) else {
            debug!(participant_id = %participant_id, "Event for unknown session");
            return None;
        };
        if &session.session_id != event.session_id() {
            debug!(participant_id = %participant_id, "Event from replaced session");
            return None;
        }

        match event {
            PeerEvent::IceCandidate { candidate, .. } => {
                self.signaling
                    .send(&SignalingMessage::IceCandidate {
                        room_id: self.signaling.room_id().to_string(),
                        target_id: Some(participant_id),
                        from_id: None,
                        candidate,
                    })
                    .await;
                None
            }
            PeerEvent::RemoteTrack { stream, .. } => {
                info!(participant_id = %participant_id, stream_id = %stream.id, "Remote stream");
                Some(PeerNotice::RemoteStream {
                    participant_id,
                    stream,
                })
            }
            PeerEvent::StateChanged { state, .. } => {
                session.connection_state = state;
                match state {
                    PeerConnectionState::Failed => {
                        warn!(participant_id = %participant_id, "Peer connection failed");
                        session.state = NegotiationState::Failed;
                        Some(PeerNotice::ConnectionFailed { participant_id })
                    }
                    PeerConnectionState::Closed => {
                        session.state = NegotiationState::Closed;
                        None
                    }
                    _ => {
                        debug!(participant_id = %participant_id, state = ?state, "Peer state");
                        None
                    }
                }
            }
        }
    }

    // -- teardown ------------------------------------------------------------

    /// Returns `false` if there was no session.
    pub fn close_session(&mut self, participant_id: &str) -> bool {
        self.orphan_candidates.remove(participant_id);
        match self.sessions.remove(participant_id) {
            Some(mut session) => {
                session.close();
                info!(participant_id = %participant_id, "Peer session closed");
                true
            }
            None => false,
        }
    }

    pub fn close_all(&mut self) {
        for (participant_id, mut session) in self.sessions.drain() {
            session.close();
            debug!(participant_id = %participant_id, "Peer session closed");
        }
        self.orphan_candidates.clear();
    }

    /// Swap the microphone track on every session.
    pub fn replace_audio_track(&mut self, track: &TrackHandle) -> usize {
        self.replace_track(TrackKind::Audio, track)
    }

    /// Swap the outbound track of `kind` on every session in one pass.
    ///
    /// No renegotiation takes place. Returns how many senders were updated.
    pub fn replace_track(&mut self, kind: TrackKind, track: &TrackHandle) -> usize {
        let mut replaced = 0;
        for (participant_id, session) in self.sessions.iter_mut() {
            match session.connection.replace_track(kind, Arc::clone(track)) {
                Ok(true) => replaced += 1,
                Ok(false) => {
                    debug!(participant_id = %participant_id, "No sender to replace");
                }
                Err(e) => {
                    warn!(participant_id = %participant_id, error = %e, "Track replacement failed");
                }
            }
        }
        replaced
    }
}

fn attach_tracks(session: &mut PeerSession, local: Option<&MediaStream>) -> Result<(), MediaError> {
    if session.tracks_attached {
        return Ok(());
    }
    if let Some(stream) = local {
        for track in &stream.tracks {
            session.connection.add_track(Arc::clone(track), &stream.id)?;
        }
    }
    session.tracks_attached = true;
    Ok(())
}

async fn flush_candidates(session: &mut PeerSession) {
    while let Some(candidate) = session.pending_candidates.pop_front() {
        if let Err(e) = session.connection.add_ice_candidate(candidate).await {
            warn!(
                participant_id = %session.participant_id,
                error = %e,
                "Failed to add queued ICE candidate"
            );
        }
    }
}

async fn negotiate_offer(
    session: &mut PeerSession,
    local: Option<&MediaStream>,
) -> Result<SessionDescription, MediaError> {
    attach_tracks(session, local)?;
    let offer = session.connection.create_offer().await?;
    session
        .connection
        .set_local_description(offer.clone())
        .await?;
    session.state = NegotiationState::Offering;
    Ok(offer)
}

async fn negotiate_answer(
    session: &mut PeerSession,
    offer: SessionDescription,
    local: Option<&MediaStream>,
) -> Result<SessionDescription, MediaError> {
    session.state = NegotiationState::Answering;
    session.connection.set_remote_description(offer).await?;
    session.remote_description_set = true;
    flush_candidates(session).await;
    attach_tracks(session, local)?;
    let answer = session.connection.create_answer().await?;
    session
        .connection
        .set_local_description(answer.clone())
        .await?;
    session.state = NegotiationState::Connected;
    Ok(answer)
}
