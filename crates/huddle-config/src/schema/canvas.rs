//! Shared canvas and room chat settings.

use serde::{Deserialize, Serialize};

/// Initial drawing tool state for the collaboration canvas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub tool: String,
    pub color: String,
    pub brush_size: u32,
    /// Eraser strokes are this many times wider than the brush.
    pub eraser_multiplier: u32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            tool: "pen".into(),
            color: "#000000".into(),
            brush_size: 2,
            eraser_multiplier: 3,
        }
    }
}

/// Room chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub max_messages: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self { max_messages: 500 }
    }
}
