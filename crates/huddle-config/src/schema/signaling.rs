//! Signaling transport and ICE configuration types.

use serde::{Deserialize, Serialize};

/// Signaling relay connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    /// Base WebSocket URL of the relay; the room path is appended.
    pub server_url: String,
    /// Seconds to wait for the WebSocket handshake.
    pub connect_timeout_secs: u32,
    /// Capacity of the inbound event channel.
    pub event_buffer: u32,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://localhost:3000".into(),
            connect_timeout_secs: 15,
            event_buffer: 256,
        }
    }
}

/// A single ICE server entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(urls: &str) -> Self {
        Self {
            urls: urls.into(),
            username: None,
            credential: None,
        }
    }
}

/// ICE servers handed to every peer connection.
///
/// Only STUN servers ship by default. Without a TURN entry peers behind
/// symmetric NATs cannot connect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IceConfig {
    pub servers: Vec<IceServer>,
}

impl Default for IceConfig {
    fn default() -> Self {
        Self {
            servers: vec![
                IceServer::stun("stun:stun.l.google.com:19302"),
                IceServer::stun("stun:stun1.l.google.com:19302"),
            ],
        }
    }
}
