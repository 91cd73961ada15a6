//! Stroke collection → canvas draw calls.
//!
//! Every frame is drawn from scratch: clear to the background, then each
//! stroke in stored order, completed or not. Color names are resolved here,
//! at draw time, so a stroke with a name this palette does not know takes
//! whatever pencil is selected when the frame is drawn.

use drawx_core::{CanvasTransform, Rgba, Stroke, SwatchColor};

use crate::canvas::{Canvas, Path, StrokeStyle};
use crate::config::RenderConfig;

/// What one frame contained.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Sequence number of the frame, 1-based.
    pub frame: u64,
    /// Store version the frame was drawn from (0 for background-only).
    pub version: u64,
    pub strokes: u32,
    pub segments: u32,
    /// Strokes that could not be drawn.
    pub skipped: u32,
}

/// Surface path for a stroke: first point `move_to`, the rest `line_to`.
/// `None` for a stroke without points.
pub fn build_path(stroke: &Stroke, transform: &CanvasTransform) -> Option<Path> {
    let (first, rest) = stroke.points.split_first()?;
    let mut path = Path::with_capacity(stroke.points.len());
    let (x, y) = transform.to_screen(*first);
    path.move_to(x, y);
    for p in rest {
        let (x, y) = transform.to_screen(*p);
        path.line_to(x, y);
    }
    Some(path)
}

/// Paint color for a stored color name.
pub fn paint_color(stroke: &Stroke, selected: Rgba) -> Rgba {
    SwatchColor::resolve(&stroke.color, selected)
}

pub fn draw_background<C: Canvas + ?Sized>(canvas: &mut C, config: &RenderConfig) {
    canvas.clear(config.background);
}

/// Draw a full frame of `strokes`.
pub fn draw_scene<'a, C, I>(
    canvas: &mut C,
    strokes: I,
    transform: &CanvasTransform,
    config: &RenderConfig,
    selected: Rgba,
) -> FrameStats
where
    C: Canvas + ?Sized,
    I: IntoIterator<Item = &'a Stroke>,
{
    draw_background(canvas, config);

    let width = transform.stroke_width(config.base_stroke_width);
    let mut stats = FrameStats::default();
    for stroke in strokes {
        let Some(path) = build_path(stroke, transform) else {
            log::debug!("Skipping stroke {} with no points", stroke.id);
            stats.skipped += 1;
            continue;
        };
        let style = StrokeStyle {
            color: paint_color(stroke, selected),
            width,
        };
        canvas.stroke_path(&path, &style);
        stats.strokes += 1;
        stats.segments += path.segment_count() as u32;
    }
    stats
}
