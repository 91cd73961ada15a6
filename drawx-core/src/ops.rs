//! Change records.
//!
//! A transaction is an ordered list of `StrokeOp`s. The same records are
//! written to the persistence log, replayed on recovery, and published to
//! replication subscribers, so they are the only way the collection changes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Point, StrokeId};

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum StrokeOp {
    /// New in-progress stroke with its first point.
    Create {
        id: StrokeId,
        color: String,
        point: Point,
    },
    /// One more point on an in-progress stroke.
    Append { id: StrokeId, point: Point },
    /// Mark a stroke completed. It is frozen from here on.
    Complete { id: StrokeId },
    /// Remove every stroke.
    Clear,
}

impl StrokeOp {
    /// Stroke touched by this op, if it targets a single one.
    pub fn stroke_id(&self) -> Option<StrokeId> {
        match self {
            StrokeOp::Create { id, .. } | StrokeOp::Append { id, .. } | StrokeOp::Complete { id } => {
                Some(*id)
            }
            StrokeOp::Clear => None,
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            StrokeOp::Create { .. } => "create",
            StrokeOp::Append { .. } => "append",
            StrokeOp::Complete { .. } => "complete",
            StrokeOp::Clear => "clear",
        }
    }
}

/// An op that would break a collection invariant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OpError {
    #[error("Stroke not found: {0}")]
    UnknownStroke(StrokeId),
    #[error("Stroke already completed: {0}")]
    AlreadyCompleted(StrokeId),
    #[error("Stroke already exists: {0}")]
    DuplicateStroke(StrokeId),
}
