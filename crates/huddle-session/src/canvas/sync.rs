use std::collections::HashMap;

use huddle_config::CanvasConfig;
use tracing::debug;

use super::surface::CanvasSurface;
use super::types::{BrushSettings, DrawStroke, StrokePoint, StrokeStyle};
use crate::protocol::{DrawAction, DrawEvent, Tool};

/// Local pointer handling plus replay of remote strokes.
pub struct CanvasSync {
    brush: BrushSettings,
    defaults: BrushSettings,
    eraser_multiplier: f64,
    surface: Box<dyn CanvasSurface>,
    local: Option<DrawStroke>,
    /// In-progress remote strokes, keyed by sender.
    remote: HashMap<String, DrawStroke>,
}

impl CanvasSync {
    pub fn new(config: &CanvasConfig, surface: Box<dyn CanvasSurface>) -> Self {
        let brush = BrushSettings::from(config);
        Self {
            defaults: brush.clone(),
            brush,
            eraser_multiplier: f64::from(config.eraser_multiplier),
            surface,
            local: None,
            remote: HashMap::new(),
        }
    }

    pub fn brush(&self) -> &BrushSettings {
        &self.brush
    }

    /// Takes effect from the next stroke.
    pub fn set_tool(&mut self, tool: Tool) {
        self.brush.tool = tool;
    }

    pub fn set_color(&mut self, color: &str) {
        self.brush.color = color.to_string();
    }

    pub fn set_brush_size(&mut self, size: f64) {
        self.brush.size = size;
    }

    pub fn is_drawing(&self) -> bool {
        self.local.is_some()
    }

    // -- local ---------------------------------------------------------------

    /// Begin a stroke with the current brush. Returns the `start` event.
    pub fn pointer_down(&mut self, point: StrokePoint) -> DrawEvent {
        let brush = self.brush.clone();
        let event = DrawEvent::start(
            point.x,
            point.y,
            brush.tool.clone(),
            &brush.color,
            brush.size,
        );
        self.local = Some(DrawStroke {
            brush,
            points: vec![point],
        });
        event
    }

    /// Extend the active stroke. `None` if no stroke is active.
    pub fn pointer_move(&mut self, point: StrokePoint) -> Option<DrawEvent> {
        let stroke = self.local.as_mut()?;
        render_segment(
            self.surface.as_mut(),
            stroke,
            point,
            self.eraser_multiplier,
        );
        Some(DrawEvent::moved(point.x, point.y))
    }

    /// Finish the active stroke. Also used when the pointer leaves the canvas.
    pub fn pointer_up(&mut self) -> Option<DrawEvent> {
        self.local.take().map(|_| DrawEvent::stop())
    }

    /// Wipe the local canvas. The caller broadcasts `clear-canvas`.
    pub fn clear(&mut self) {
        self.surface.clear();
    }

    // -- remote --------------------------------------------------------------

    /// Replay one remote stroke step.
    pub fn apply_remote(&mut self, from_id: &str, event: &DrawEvent) {
        match event.action {
            DrawAction::Start => {
                let Some((x, y)) = event.point() else {
                    debug!(from_id = %from_id, "Draw start without position");
                    return;
                };
                let brush = BrushSettings {
                    tool: event.tool.clone().unwrap_or_else(|| self.defaults.tool.clone()),
                    color: event
                        .color
                        .clone()
                        .unwrap_or_else(|| self.defaults.color.clone()),
                    size: event.brush_size.unwrap_or(self.defaults.size),
                };
                self.remote.insert(
                    from_id.to_string(),
                    DrawStroke {
                        brush,
                        points: vec![StrokePoint::new(x, y)],
                    },
                );
            }
            DrawAction::Move => {
                let (Some(stroke), Some((x, y))) = (self.remote.get_mut(from_id), event.point())
                else {
                    debug!(from_id = %from_id, "Draw move without active stroke");
                    return;
                };
                render_segment(
                    self.surface.as_mut(),
                    stroke,
                    StrokePoint::new(x, y),
                    self.eraser_multiplier,
                );
            }
            DrawAction::Stop => {
                self.remote.remove(from_id);
            }
        }
    }

    pub fn apply_remote_clear(&mut self) {
        self.surface.clear();
    }

    /// Forget a departed sender's unfinished stroke.
    pub fn forget_sender(&mut self, from_id: &str) {
        self.remote.remove(from_id);
    }
}

/// Draw the segment from the stroke's last point to `point` and append it.
fn render_segment(
    surface: &mut dyn CanvasSurface,
    stroke: &mut DrawStroke,
    point: StrokePoint,
    eraser_multiplier: f64,
) {
    if let Some(prev) = stroke.last_point() {
        surface.apply_style(&StrokeStyle::for_brush(&stroke.brush, eraser_multiplier));
        surface.begin_path();
        surface.move_to(prev.x, prev.y);
        surface.line_to(point.x, point.y);
        surface.stroke();
    }
    stroke.points.push(point);
}
