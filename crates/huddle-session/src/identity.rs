use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::UserInfo;

/// The local participant as announced to a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Identity {
    /// Fresh identity with a random id.
    pub fn generate(username: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            avatar_url: None,
        }
    }

    pub fn with_id(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            avatar_url: None,
        }
    }

    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    /// The form sent inside `join` and received in rosters.
    pub fn to_user_info(&self) -> UserInfo {
        UserInfo {
            id: self.id.clone(),
            username: self.username.clone(),
            avatar: self.avatar_url.clone(),
        }
    }
}
