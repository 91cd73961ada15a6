//! Immutable, ordered view of the stroke collection.
//!
//! Readers get an `Arc<StrokeSnapshot>` and can hold it as long as they like;
//! a transaction works on its own copy and swaps it in on commit. Strokes are
//! `Arc`-shared so that copy only clones the stroke being touched.

use std::collections::HashMap;
use std::sync::Arc;

use drawx_core::{OpError, Stroke, StrokeId, StrokeOp};

#[derive(Clone, Debug, Default)]
pub struct StrokeSnapshot {
    /// Commit version this snapshot reflects.
    version: u64,
    /// Strokes in insertion order.
    strokes: Vec<Arc<Stroke>>,
    /// Stroke id → position in `strokes`.
    index: HashMap<StrokeId, usize>,
}

impl StrokeSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from recovered strokes, keeping their order.
    pub fn from_strokes(version: u64, strokes: Vec<Stroke>) -> Self {
        let mut snapshot = Self {
            version,
            strokes: Vec::with_capacity(strokes.len()),
            index: HashMap::with_capacity(strokes.len()),
        };
        for stroke in strokes {
            snapshot.index.insert(stroke.id, snapshot.strokes.len());
            snapshot.strokes.push(Arc::new(stroke));
        }
        snapshot
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn get(&self, id: &StrokeId) -> Option<&Stroke> {
        self.index.get(id).map(|&i| self.strokes[i].as_ref())
    }

    pub fn contains(&self, id: &StrokeId) -> bool {
        self.index.contains_key(id)
    }

    /// Strokes in stored order.
    pub fn iter(&self) -> impl Iterator<Item = &Stroke> {
        self.strokes.iter().map(|s| s.as_ref())
    }

    /// Shared handle to one stroke, for callers that outlive the snapshot.
    pub fn stroke_arc(&self, id: &StrokeId) -> Option<Arc<Stroke>> {
        self.index.get(id).map(|&i| self.strokes[i].clone())
    }

    /// Total points across all strokes.
    pub fn point_count(&self) -> usize {
        self.strokes.iter().map(|s| s.points.len()).sum()
    }

    /// Strokes not yet completed.
    pub fn in_progress(&self) -> impl Iterator<Item = &Stroke> {
        self.iter().filter(|s| !s.completed)
    }

    /// Apply one op, enforcing the collection invariants:
    /// strokes are created with a point, only in-progress strokes change,
    /// and completed strokes are frozen.
    pub fn apply(&mut self, op: &StrokeOp) -> Result<(), OpError> {
        match op {
            StrokeOp::Create { id, color, point } => {
                if self.index.contains_key(id) {
                    return Err(OpError::DuplicateStroke(*id));
                }
                self.index.insert(*id, self.strokes.len());
                self.strokes
                    .push(Arc::new(Stroke::begin(*id, color.clone(), *point)));
            }
            StrokeOp::Append { id, point } => {
                let stroke = self.open_stroke_mut(id)?;
                stroke.points.push(*point);
            }
            StrokeOp::Complete { id } => {
                let stroke = self.open_stroke_mut(id)?;
                stroke.completed = true;
            }
            StrokeOp::Clear => {
                self.strokes.clear();
                self.index.clear();
            }
        }
        Ok(())
    }

    fn open_stroke_mut(&mut self, id: &StrokeId) -> Result<&mut Stroke, OpError> {
        let &i = self.index.get(id).ok_or(OpError::UnknownStroke(*id))?;
        if self.strokes[i].completed {
            return Err(OpError::AlreadyCompleted(*id));
        }
        Ok(Arc::make_mut(&mut self.strokes[i]))
    }

    /// Owned copies of every stroke, for snapshot persistence.
    pub fn to_vec(&self) -> Vec<Stroke> {
        self.iter().cloned().collect()
    }
}
