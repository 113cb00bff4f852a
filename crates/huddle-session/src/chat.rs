//! Room chat history.
//!
//! Messages live in a bounded ring buffer so memory stays predictable in
//! long sessions. Membership changes are recorded as system messages.

use std::collections::VecDeque;

use huddle_common::new_id;
use huddle_config::ChatConfig;
use serde::{Deserialize, Serialize};

use crate::protocol::UserInfo;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub content: String,
    /// RFC 3339, local receive time.
    pub timestamp: String,
    /// Generated by the client, not typed by a participant.
    pub system: bool,
}

impl ChatMessage {
    pub fn from_user(user: &UserInfo, content: &str) -> Self {
        Self {
            id: new_id(),
            user_id: user.id.clone(),
            username: user.username.clone(),
            content: content.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            system: false,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            user_id: "system".into(),
            username: "System".into(),
            content: content.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            system: true,
        }
    }
}

/// Trim outgoing chat text. `None` if nothing is left to send.
pub fn normalize_outgoing(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

pub struct ChatHistory {
    max_messages: usize,
    messages: VecDeque<ChatMessage>,
}

impl ChatHistory {
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            max_messages: (config.max_messages as usize).max(1),
            messages: VecDeque::new(),
        }
    }

    /// Oldest message is evicted when full.
    pub fn push(&mut self, msg: ChatMessage) {
        if self.messages.len() >= self.max_messages {
            self.messages.pop_front();
        }
        self.messages.push_back(msg);
    }

    /// The most recent `limit` messages, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<&ChatMessage> {
        let skip = self.messages.len().saturating_sub(limit);
        self.messages.iter().skip(skip).collect()
    }

    pub fn all(&self) -> Vec<&ChatMessage> {
        self.messages.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self::new(&ChatConfig::default())
    }
}
