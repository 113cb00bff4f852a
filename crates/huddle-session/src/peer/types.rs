use std::collections::VecDeque;
use std::fmt;

use huddle_common::SessionId;

use crate::media::{PeerConnection, PeerConnectionState};
use crate::protocol::IceCandidate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    None,
    /// Local offer sent, waiting for the answer.
    Offering,
    /// Remote offer applied, answer being produced.
    Answering,
    /// Both descriptions exchanged.
    Connected,
    Failed,
    Closed,
}

/// A connection to one remote participant plus its negotiation state.
pub struct PeerSession {
    pub(crate) participant_id: String,
    pub(crate) session_id: SessionId,
    pub(crate) connection: Box<dyn PeerConnection>,
    pub(crate) state: NegotiationState,
    pub(crate) connection_state: PeerConnectionState,
    pub(crate) remote_description_set: bool,
    pub(crate) tracks_attached: bool,
    pub(crate) pending_candidates: VecDeque<IceCandidate>,
}

impl PeerSession {
    pub(crate) fn new(
        participant_id: &str,
        session_id: SessionId,
        connection: Box<dyn PeerConnection>,
    ) -> Self {
        Self {
            participant_id: participant_id.to_string(),
            session_id,
            connection,
            state: NegotiationState::None,
            connection_state: PeerConnectionState::New,
            remote_description_set: false,
            tracks_attached: false,
            pending_candidates: VecDeque::new(),
        }
    }

    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn connection_state(&self) -> PeerConnectionState {
        self.connection_state
    }

    pub fn remote_description_set(&self) -> bool {
        self.remote_description_set
    }

    pub fn pending_candidate_count(&self) -> usize {
        self.pending_candidates.len()
    }

    /// Failed and closed sessions are replaced rather than renegotiated.
    pub fn is_live(&self) -> bool {
        !matches!(self.state, NegotiationState::Failed | NegotiationState::Closed)
    }

    pub(crate) fn close(&mut self) {
        self.connection.close();
        self.state = NegotiationState::Closed;
        self.connection_state = PeerConnectionState::Closed;
        self.pending_candidates.clear();
    }
}

impl fmt::Debug for PeerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerSession")
            .field("participant_id", &self.participant_id)
            .field("session_id", &self.session_id)
            .field("state", &self.state)
            .field("connection_state", &self.connection_state)
            .field("pending_candidates", &self.pending_candidates.len())
            .finish()
    }
}
