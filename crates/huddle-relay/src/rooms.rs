//! Room registry: maps `(kind, room)` to the members connected to it.

use std::collections::HashMap;
use std::sync::Arc;

use huddle_session::protocol::{SignalingMessage, UserInfo};
use tokio::sync::{mpsc, RwLock};

use crate::protocol::{Delivery, RoomKey};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("room is full ({0} participants)")]
    RoomFull(usize),

    #[error("participant {0} is already in the room")]
    DuplicateId(String),
}

/// One connected member. Frames for it are queued on `tx` and written by
/// its connection task.
struct Member {
    user: UserInfo,
    tx: mpsc::Sender<String>,
}

/// Thread-safe room registry.
#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<RoomKey, Vec<Member>>>>,
    max_participants: usize,
}

impl RoomRegistry {
    pub fn new(max_participants: usize) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            max_participants: max_participants.max(1),
        }
    }

    /// Add a member. Returns the roster in join order, the new member last.
    /// Everyone already present is sent `user-joined`.
    pub async fn join(
        &self,
        key: &RoomKey,
        user: UserInfo,
        tx: mpsc::Sender<String>,
    ) -> Result<Vec<UserInfo>, JoinError> {
        let (roster, others) = {
            let mut rooms = self.rooms.write().await;
            let members = rooms.entry(key.clone()).or_default();
            if members.iter().any(|m| m.user.id == user.id) {
                return Err(JoinError::DuplicateId(user.id));
            }
            if members.len() >= self.max_participants {
                return Err(JoinError::RoomFull(self.max_participants));
            }
            let others: Vec<_> = members.iter().map(|m| m.tx.clone()).collect();
            members.push(Member {
                user: user.clone(),
                tx,
            });
            let roster: Vec<_> = members.iter().map(|m| m.user.clone()).collect();
            (roster, others)
        };

        tracing::info!(
            kind = key.0.path_segment(),
            room = %key.1,
            user_id = %user.id,
            members = roster.len(),
            "Member joined"
        );
        deliver(&others, &SignalingMessage::UserJoined { user }).await;
        Ok(roster)
    }

    /// Remove a member and tell the rest. Empty rooms are dropped.
    pub async fn leave(&self, key: &RoomKey, user_id: &str) -> Option<UserInfo> {
        let (user, others) = {
            let mut rooms = self.rooms.write().await;
            let members = rooms.get_mut(key)?;
            let pos = members.iter().position(|m| m.user.id == user_id)?;
            let member = members.remove(pos);
            let others: Vec<_> = members.iter().map(|m| m.tx.clone()).collect();
            if members.is_empty() {
                rooms.remove(key);
                tracing::debug!(room = %key.1, "Room empty, dropped");
            }
            (member.user, others)
        };

        tracing::info!(room = %key.1, user_id = %user_id, "Member left");
        deliver(
            &others,
            &SignalingMessage::UserLeft {
                user_id: user.id.clone(),
                username: Some(user.username.clone()),
            },
        )
        .await;
        Some(user)
    }

    /// Forward a client message to the members `delivery` names.
    pub async fn forward(
        &self,
        key: &RoomKey,
        sender: &str,
        delivery: Delivery,
        message: &SignalingMessage,
    ) {
        let targets: Vec<_> = {
            let rooms = self.rooms.read().await;
            let Some(members) = rooms.get(key) else {
                return;
            };
            match &delivery {
                Delivery::To(target) => members
                    .iter()
                    .filter(|m| &m.user.id == target)
                    .map(|m| m.tx.clone())
                    .collect(),
                Delivery::Others => members
                    .iter()
                    .filter(|m| m.user.id != sender)
                    .map(|m| m.tx.clone())
                    .collect(),
                Delivery::Drop => Vec::new(),
            }
        };
        if targets.is_empty() {
            if let Delivery::To(target) = delivery {
                tracing::debug!(room = %key.1, target = %target, "Target not in room");
            }
            return;
        }
        deliver(&targets, message).await;
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn member_count(&self, key: &RoomKey) -> usize {
        self.rooms.read().await.get(key).map_or(0, Vec::len)
    }
}

async fn deliver(targets: &[mpsc::Sender<String>], message: &SignalingMessage) {
    let json = match message.encode() {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode relay message");
            return;
        }
    };
    for tx in targets {
        if tx.send(json.clone()).await.is_err() {
            tracing::debug!("Member channel closed");
        }
    }
}
