use std::sync::{Arc, Mutex, MutexGuard};

use super::types::StrokeStyle;

/// The embedder's 2D drawing context.
pub trait CanvasSurface: Send + Sync {
    fn apply_style(&mut self, style: &StrokeStyle);
    fn begin_path(&mut self);
    fn move_to(&mut self, x: f64, y: f64);
    fn line_to(&mut self, x: f64, y: f64);
    fn stroke(&mut self);
    fn clear(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Style(StrokeStyle),
    BeginPath,
    MoveTo(f64, f64),
    LineTo(f64, f64),
    Stroke,
    Clear,
}

/// A surface that only records what it was asked to draw.
///
/// Clones share one op log, so a caller can hand one clone to a
/// [`CanvasSync`](super::CanvasSync) and read the ops from another.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    ops: Arc<Mutex<Vec<DrawOp>>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> MutexGuard<'_, Vec<DrawOp>> {
        self.ops.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn ops(&self) -> Vec<DrawOp> {
        self.log().clone()
    }

    /// No stroke has been drawn since the last clear.
    pub fn is_blank(&self) -> bool {
        !self
            .log()
            .iter()
            .rev()
            .take_while(|op| **op != DrawOp::Clear)
            .any(|op| *op == DrawOp::Stroke)
    }

    pub fn stroke_count(&self) -> usize {
        self.log().iter().filter(|op| **op == DrawOp::Stroke).count()
    }
}

impl CanvasSurface for RecordingSurface {
    fn apply_style(&mut self, style: &StrokeStyle) {
        self.log().push(DrawOp::Style(style.clone()));
    }

    fn begin_path(&mut self) {
        self.log().push(DrawOp::BeginPath);
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.log().push(DrawOp::MoveTo(x, y));
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.log().push(DrawOp::LineTo(x, y));
    }

    fn stroke(&mut self) {
        self.log().push(DrawOp::Stroke);
    }

    fn clear(&mut self) {
        self.log().push(DrawOp::Clear);
    }
}
