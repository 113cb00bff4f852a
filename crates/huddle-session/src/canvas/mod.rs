//! Shared freehand canvas.
//!
//! Strokes are replicated as `draw` events and never stored on the relay.
//! Local and remote strokes go through the same segment renderer, so two
//! surfaces fed the same events end up with the same drawing ops.

mod surface;
mod sync;
mod types;

pub use surface::{CanvasSurface, DrawOp, RecordingSurface};
pub use sync::CanvasSync;
pub use types::{BrushSettings, CompositeOp, DrawStroke, StrokePoint, StrokeStyle};
