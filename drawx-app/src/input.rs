//! Pointer events → stroke actions.
//!
//! Raw positions are surface pixels; actions carry logical canvas points.
//! Only the pointer that started the current gesture can extend or end it,
//! so a second finger landing mid-stroke is ignored.

use drawx_core::{CanvasTransform, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub pointer_id: u64,
    pub phase: PointerPhase,
    /// Surface-relative pixels.
    pub x: f64,
    pub y: f64,
}

impl PointerEvent {
    pub fn down(pointer_id: u64, x: f64, y: f64) -> Self {
        Self {
            pointer_id,
            phase: PointerPhase::Down,
            x,
            y,
        }
    }

    pub fn moved(pointer_id: u64, x: f64, y: f64) -> Self {
        Self {
            phase: PointerPhase::Move,
            ..Self::down(pointer_id, x, y)
        }
    }

    pub fn up(pointer_id: u64, x: f64, y: f64) -> Self {
        Self {
            phase: PointerPhase::Up,
            ..Self::down(pointer_id, x, y)
        }
    }

    pub fn cancel(pointer_id: u64) -> Self {
        Self {
            phase: PointerPhase::Cancel,
            ..Self::down(pointer_id, 0.0, 0.0)
        }
    }
}

/// What the writer should do for one event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StrokeAction {
    Begin(Point),
    Extend(Point),
    Finish(Point),
    Abort,
}

#[derive(Debug, Default)]
pub struct InputCapture {
    transform: Option<CanvasTransform>,
    edge: Option<f64>,
    active_pointer: Option<u64>,
    dropped: u64,
}

impl InputCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture against a canvas edge other than the default.
    pub fn with_edge(edge: f64) -> Self {
        Self {
            edge: Some(edge),
            ..Self::default()
        }
    }

    /// Surface size changed. A zero size disables capture until the next
    /// valid size.
    pub fn set_surface(&mut self, width: u32, height: u32) {
        self.transform = match self.edge {
            Some(edge) => CanvasTransform::with_edge(width, height, edge),
            None => CanvasTransform::for_surface(width, height),
        };
    }

    pub fn clear_surface(&mut self) {
        self.transform = None;
        self.active_pointer = None;
    }

    pub fn transform(&self) -> Option<&CanvasTransform> {
        self.transform.as_ref()
    }

    pub fn active_pointer(&self) -> Option<u64> {
        self.active_pointer
    }

    /// Events dropped because no surface size was known.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn map(&mut self, event: &PointerEvent) -> Option<StrokeAction> {
        let Some(transform) = self.transform else {
            self.dropped += 1;
            log::debug!("Dropping {:?} before the surface has a size", event.phase);
            return None;
        };
        let point = transform.to_logical(event.x, event.y);
        let owns_gesture = self.active_pointer == Some(event.pointer_id);

        match event.phase {
            PointerPhase::Down => {
                if self.active_pointer.is_some() && !owns_gesture {
                    log::trace!("Ignoring pointer {} during another gesture", event.pointer_id);
                    return None;
                }
                self.active_pointer = Some(event.pointer_id);
                Some(StrokeAction::Begin(point))
            }
            PointerPhase::Move if owns_gesture => Some(StrokeAction::Extend(point)),
            PointerPhase::Up if owns_gesture => {
                self.active_pointer = None;
                Some(StrokeAction::Finish(point))
            }
            PointerPhase::Cancel if owns_gesture => {
                self.active_pointer = None;
                Some(StrokeAction::Abort)
            }
            _ => None,
        }
    }
}
