//! Room roster and the peer sessions it calls for.
//!
//! This is the only place that decides which remote participants need a
//! session: in a voice room every existing member offers to a newcomer;
//! in a collaboration room only the current screen sharer does.

use tracing::debug;

use crate::protocol::{RoomKind, UserInfo};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: String,
    pub username: String,
    pub avatar: Option<String>,
    pub is_self: bool,
    pub talking: bool,
}

impl Participant {
    fn from_user(user: &UserInfo, self_id: &str) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            avatar: user.avatar.clone(),
            is_self: user.id == self_id,
            talking: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Create a session and send an offer.
    Initiate(String),
    Close(String),
}

/// Outcome of a roster update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterChange {
    pub joined: Vec<Participant>,
    pub left: Vec<Participant>,
    pub actions: Vec<SessionAction>,
}

impl RosterChange {
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.left.is_empty() && self.actions.is_empty()
    }
}

pub struct MembershipTracker {
    self_id: String,
    kind: RoomKind,
    roster: Vec<Participant>,
}

impl MembershipTracker {
    pub fn new(self_id: &str, kind: RoomKind) -> Self {
        Self {
            self_id: self_id.to_string(),
            kind,
            roster: Vec::new(),
        }
    }

    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    pub fn kind(&self) -> RoomKind {
        self.kind
    }

    /// Replace the roster with the relay's full list.
    ///
    /// Remote members missing from the new list get a close action. A
    /// collaboration sharer also initiates to every newly listed member.
    pub fn apply_roster(&mut self, users: &[UserInfo], sharing: bool) -> RosterChange {
        let mut change = RosterChange::default();
        let mut next: Vec<Participant> = Vec::with_capacity(users.len());

        for user in users {
            if next.iter().any(|p| p.id == user.id) {
                continue;
            }
            let mut participant = Participant::from_user(user, &self.self_id);
            match self.get(&user.id) {
                Some(existing) => participant.talking = existing.talking,
                None if !participant.is_self => {
                    if self.kind == RoomKind::Collaboration && sharing {
                        change.actions.push(SessionAction::Initiate(user.id.clone()));
                    }
                    change.joined.push(participant.clone());
                }
                None => {}
            }
            next.push(participant);
        }

        for old in &self.roster {
            if !old.is_self && !next.iter().any(|p| p.id == old.id) {
                change.actions.push(SessionAction::Close(old.id.clone()));
                change.left.push(old.clone());
            }
        }

        debug!(count = next.len(), "Roster replaced");
        self.roster = next;
        change
    }

    /// Append a newcomer. Duplicates and our own echo are ignored.
    pub fn user_joined(&mut self, user: &UserInfo, sharing: bool) -> RosterChange {
        let mut change = RosterChange::default();
        if user.id == self.self_id || self.contains(&user.id) {
            return change;
        }

        let participant = Participant::from_user(user, &self.self_id);
        let initiate = match self.kind {
            RoomKind::VoiceChat => true,
            RoomKind::Collaboration => sharing,
        };
        if initiate {
            change.actions.push(SessionAction::Initiate(user.id.clone()));
        }
        self.roster.push(participant.clone());
        change.joined.push(participant);
        change
    }

    pub fn user_left(&mut self, user_id: &str) -> RosterChange {
        let mut change = RosterChange::default();
        if user_id == self.self_id {
            return change;
        }
        if let Some(pos) = self.roster.iter().position(|p| p.id == user_id) {
            let participant = self.roster.remove(pos);
            change.actions.push(SessionAction::Close(participant.id.clone()));
            change.left.push(participant);
        }
        change
    }

    /// A sharer offers to every viewer.
    pub fn start_sharing(&self) -> Vec<SessionAction> {
        self.remote_ids()
            .into_iter()
            .map(SessionAction::Initiate)
            .collect()
    }

    pub fn stop_sharing(&self) -> Vec<SessionAction> {
        self.remote_ids()
            .into_iter()
            .map(SessionAction::Close)
            .collect()
    }

    /// Returns `false` for unknown ids or no change.
    pub fn set_talking(&mut self, user_id: &str, talking: bool) -> bool {
        match self.roster.iter_mut().find(|p| p.id == user_id) {
            Some(p) if p.talking != talking => {
                p.talking = talking;
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.roster.iter().any(|p| p.id == user_id)
    }

    pub fn get(&self, user_id: &str) -> Option<&Participant> {
        self.roster.iter().find(|p| p.id == user_id)
    }

    /// Remote participant with this id, if any.
    pub fn remote(&self, user_id: &str) -> Option<&Participant> {
        self.get(user_id).filter(|p| !p.is_self)
    }

    pub fn participants(&self) -> &[Participant] {
        &self.roster
    }

    pub fn remote_ids(&self) -> Vec<String> {
        self.roster
            .iter()
            .filter(|p| !p.is_self)
            .map(|p| p.id.clone())
            .collect()
    }

    /// Position in join order, counting everyone including us.
    pub fn index_of(&self, user_id: &str) -> Option<usize> {
        self.roster.iter().position(|p| p.id == user_id)
    }

    pub fn len(&self) -> usize {
        self.roster.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    pub fn clear(&mut self) {
        self.roster.clear();
    }
}
