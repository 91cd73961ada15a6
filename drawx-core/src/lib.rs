//! # drawx-core: stroke data model shared by every DrawX crate
//!
//! ## Modules
//!
//! - [`palette`]: named pencil colors and packed ARGB values
//! - [`transform`]: letterboxed mapping between surface pixels and the
//!   square logical canvas
//! - [`ops`]: the change records a transaction is made of
//! - [`settings`]: persisted user settings (last pencil, server, user)

pub mod ops;
pub mod palette;
pub mod settings;
pub mod transform;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use ops::{OpError, StrokeOp};
pub use palette::{Rgba, SwatchColor, UnknownColor};
pub use settings::{DrawSettings, SettingsError};
pub use transform::{CanvasTransform, Orientation, EDGE_WIDTH};

/// Identifier of a stroke. Random so strokes drawn on different devices never
/// collide once replicated into the same collection.
pub type StrokeId = Uuid;

/// A point in logical canvas coordinates.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// One continuous pointer gesture: press, drags, then release or cancel.
///
/// The color is stored by name so that devices with a different palette
/// still agree on what was drawn; resolution to pixels happens at render time.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Stroke {
    pub id: StrokeId,
    pub color: String,
    pub completed: bool,
    pub points: Vec<Point>,
}

impl Stroke {
    /// Start a stroke with its first point. A stroke is never empty once
    /// committed, so there is no constructor without a point.
    pub fn begin(id: StrokeId, color: impl Into<String>, first: Point) -> Self {
        Self {
            id,
            color: color.into(),
            completed: false,
            points: vec![first],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Number of line segments the stroke renders as.
    pub fn segment_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }
}
