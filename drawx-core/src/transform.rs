//! Surface ↔ canvas coordinate mapping.
//!
//! Strokes are stored on a square logical canvas `EDGE_WIDTH` units wide so
//! every device agrees on where a point is. A surface maps that square onto
//! its longer edge and centers it on the shorter one:
//!
//! ```text
//! portrait  (w < h): scale_ratio = EDGE / h, margin = ((w - h) / 2, 0)
//! landscape (w ≥ h): scale_ratio = EDGE / w, margin = (0, (h - w) / 2)
//!
//! screen  = stored / scale_ratio + margin
//! logical = (raw - margin) * scale_ratio
//! ```

use serde::{Deserialize, Serialize};

use crate::Point;

/// Edge length of the logical canvas, in stored units.
pub const EDGE_WIDTH: f64 = 683.0;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Mapping for one surface size. Rebuild it on every resize.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct CanvasTransform {
    /// Logical units per surface pixel.
    pub scale_ratio: f64,
    pub margin_x: f64,
    pub margin_y: f64,
    pub width: u32,
    pub height: u32,
}

impl CanvasTransform {
    /// Derive the mapping for a `width × height` surface.
    ///
    /// Returns `None` for a zero-sized surface, which has no usable mapping.
    pub fn for_surface(width: u32, height: u32) -> Option<Self> {
        Self::with_edge(width, height, EDGE_WIDTH)
    }

    /// Same as [`CanvasTransform::for_surface`] with a custom canvas edge.
    pub fn with_edge(width: u32, height: u32, edge: f64) -> Option<Self> {
        if width == 0 || height == 0 || edge <= 0.0 {
            return None;
        }
        let w = width as f64;
        let h = height as f64;
        let (scale_ratio, margin_x, margin_y) = if width < height {
            (edge / h, (w - h) / 2.0, 0.0)
        } else {
            (edge / w, 0.0, (h - w) / 2.0)
        };
        Some(Self {
            scale_ratio,
            margin_x,
            margin_y,
            width,
            height,
        })
    }

    pub fn orientation(&self) -> Orientation {
        if self.width < self.height {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
    }

    /// Stored point → surface pixels.
    pub fn to_screen(&self, p: Point) -> (f64, f64) {
        (
            p.x / self.scale_ratio + self.margin_x,
            p.y / self.scale_ratio + self.margin_y,
        )
    }

    /// Surface pixels → stored point.
    pub fn to_logical(&self, x: f64, y: f64) -> Point {
        Point {
            x: (x - self.margin_x) * self.scale_ratio,
            y: (y - self.margin_y) * self.scale_ratio,
        }
    }

    /// Line width in pixels for a width given in logical units.
    pub fn stroke_width(&self, logical_width: f64) -> f64 {
        logical_width / self.scale_ratio
    }
}
