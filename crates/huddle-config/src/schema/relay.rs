use serde::{Deserialize, Serialize};

/// Configuration for the signaling relay server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Port the relay listens on.
    pub port: u32,
    /// Members admitted per room before joins are refused.
    pub max_participants: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            max_participants: 16,
        }
    }
}

/// Log filter used when `RUST_LOG` is not set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}
