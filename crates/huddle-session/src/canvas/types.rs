use huddle_config::CanvasConfig;

use crate::protocol::Tool;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokePoint {
    pub x: f64,
    pub y: f64,
    pub pressure: f64,
    pub tilt_x: f64,
    pub tilt_y: f64,
}

impl StrokePoint {
    /// A mouse-style point: half pressure, no tilt.
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            pressure: 0.5,
            tilt_x: 0.0,
            tilt_y: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrushSettings {
    pub tool: Tool,
    pub color: String,
    pub size: f64,
}

impl From<&CanvasConfig> for BrushSettings {
    fn from(config: &CanvasConfig) -> Self {
        Self {
            tool: Tool::from(config.tool.as_str()),
            color: config.color.clone(),
            size: f64::from(config.brush_size),
        }
    }
}

/// A stroke in progress. The brush is fixed at `start`.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawStroke {
    pub brush: BrushSettings,
    pub points: Vec<StrokePoint>,
}

impl DrawStroke {
    pub fn last_point(&self) -> Option<&StrokePoint> {
        self.points.last()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeOp {
    SourceOver,
    /// Clears whatever is under the stroke.
    DestinationOut,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrokeStyle {
    pub composite: CompositeOp,
    pub color: String,
    pub width: f64,
}

impl StrokeStyle {
    pub fn for_brush(brush: &BrushSettings, eraser_multiplier: f64) -> Self {
        if brush.tool.is_eraser() {
            Self {
                composite: CompositeOp::DestinationOut,
                color: brush.color.clone(),
                width: brush.size * eraser_multiplier,
            }
        } else {
            Self {
                composite: CompositeOp::SourceOver,
                color: brush.color.clone(),
                width: brush.size,
            }
        }
    }
}
