//! Configuration schema types for Huddle.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with the defaults the room clients ship with.

mod canvas;
mod media;
mod relay;
mod signaling;

pub use canvas::*;
pub use media::*;
pub use relay::*;
pub use signaling::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for Huddle.
///
/// Only override what you want to change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HuddleConfig {
    pub signaling: SignalingConfig,
    pub ice: IceConfig,
    pub audio: AudioConfig,
    pub push_to_talk: PushToTalkConfig,
    pub vad: VadConfig,
    pub spatial: SpatialConfig,
    pub canvas: CanvasConfig,
    pub chat: ChatConfig,
    pub relay: RelayConfig,
    pub logging: LoggingConfig,
}

// =============================================================================
// Tests
// =============================================================================
