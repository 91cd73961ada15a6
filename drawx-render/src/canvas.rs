//! Drawing contracts.
//!
//! ```text
//!   FrameSink::acquire() ──► Frame: Canvas ──► clear / stroke_path ──► FrameSink::present(frame)
//! ```
//!
//! A sink hands out one back buffer at a time. Whatever was drawn into it
//! becomes visible on `present`; until then the previous frame stays on
//! screen.

use serde::{Deserialize, Serialize};

use drawx_core::Rgba;

use crate::error::SinkError;

/// One path instruction in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PathCommand {
    MoveTo(f64, f64),
    LineTo(f64, f64),
}

/// An open polyline: one `MoveTo` followed by `LineTo`s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Path {
    commands: Vec<PathCommand>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            commands: Vec::with_capacity(n),
        }
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        self.commands.push(PathCommand::MoveTo(x, y));
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        self.commands.push(PathCommand::LineTo(x, y));
    }

    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    /// Vertex positions in order, ignoring the command kind.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.commands.iter().map(|c| match *c {
            PathCommand::MoveTo(x, y) | PathCommand::LineTo(x, y) => (x, y),
        })
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn segment_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, PathCommand::LineTo(..)))
            .count()
    }
}

/// Paint for a stroked path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    pub color: Rgba,
    /// Line width in surface pixels.
    pub width: f64,
}

/// A drawable frame buffer.
pub trait Canvas {
    /// Pixel size.
    fn size(&self) -> (u32, u32);

    fn clear(&mut self, color: Rgba);

    /// Stroke an open path with round caps and joins.
    fn stroke_path(&mut self, path: &Path, style: &StrokeStyle);
}

/// Double-buffered drawable surface.
pub trait FrameSink {
    type Frame: Canvas;

    /// Take the back buffer. May block briefly.
    fn acquire(&mut self) -> Result<Self::Frame, SinkError>;

    /// Show a frame obtained from `acquire`.
    fn present(&mut self, frame: Self::Frame) -> Result<(), SinkError>;

    /// The surface changed size; later frames should match it.
    fn resized(&mut self, _width: u32, _height: u32) {}
}
