use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Failures surfaced by a media backend (capture, playback, peer connections).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("negotiation failed: {0}")]
    Negotiation(String),

    #[error("connection closed")]
    Closed,

    #[error("not supported: {0}")]
    NotSupported(String),
}

impl MediaError {
    /// Whether the failure must abort joining a room.
    pub fn is_capture_failure(&self) -> bool {
        matches!(
            self,
            MediaError::PermissionDenied(_) | MediaError::DeviceUnavailable(_)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SignalingError {
    #[error("signaling transport is not open")]
    NotConnected,

    #[error("failed to encode signaling message: {0}")]
    Encode(String),

    #[error("failed to decode signaling message: {0}")]
    Decode(String),

    #[error("signaling transport error: {0}")]
    Transport(String),
}

#[derive(Debug, thiserror::Error)]
pub enum HuddleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Signaling(#[from] SignalingError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
