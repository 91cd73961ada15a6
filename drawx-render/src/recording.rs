//! Sink that records draw calls instead of producing pixels.
//!
//! Used by tests and headless runs. The log is shared, so a test can keep a
//! `RecordingLog` while the sink itself moves onto the render thread.

use std::sync::{Arc, Mutex, MutexGuard};

use drawx_core::Rgba;

use crate::canvas::{Canvas, FrameSink, Path, StrokeStyle};
use crate::error::SinkError;

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCall {
    Clear(Rgba),
    Stroke { path: Path, style: StrokeStyle },
}

/// A presented frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedFrame {
    pub size: (u32, u32),
    pub calls: Vec<DrawCall>,
}

impl RecordedFrame {
    /// Only the background was drawn.
    pub fn is_background_only(&self) -> bool {
        self.calls.iter().all(|c| matches!(c, DrawCall::Clear(_)))
    }

    pub fn strokes(&self) -> impl Iterator<Item = (&Path, &StrokeStyle)> {
        self.calls.iter().filter_map(|c| match c {
            DrawCall::Stroke { path, style } => Some((path, style)),
            DrawCall::Clear(_) => None,
        })
    }
}

impl Canvas for RecordedFrame {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn clear(&mut self, color: Rgba) {
        self.calls.push(DrawCall::Clear(color));
    }

    fn stroke_path(&mut self, path: &Path, style: &StrokeStyle) {
        self.calls.push(DrawCall::Stroke {
            path: path.clone(),
            style: *style,
        });
    }
}

#[derive(Default)]
struct LogState {
    frames: Vec<RecordedFrame>,
    /// Upcoming acquires to fail.
    failing_acquires: u32,
    acquire_failures: u32,
}

/// Read side of a [`RecordingSink`].
#[derive(Clone, Default)]
pub struct RecordingLog {
    state: Arc<Mutex<LogState>>,
}

impl RecordingLog {
    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// All presented frames, oldest first.
    pub fn frames(&self) -> Vec<RecordedFrame> {
        self.lock().frames.clone()
    }

    pub fn last(&self) -> Option<RecordedFrame> {
        self.lock().frames.last().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().frames.is_empty()
    }

    /// Make the next `n` acquires fail.
    pub fn fail_next_acquires(&self, n: u32) {
        self.lock().failing_acquires = n;
    }

    pub fn acquire_failures(&self) -> u32 {
        self.lock().acquire_failures
    }
}

pub struct RecordingSink {
    size: (u32, u32),
    log: RecordingLog,
}

impl RecordingSink {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            log: RecordingLog::default(),
        }
    }

    pub fn log(&self) -> RecordingLog {
        self.log.clone()
    }
}

impl FrameSink for RecordingSink {
    type Frame = RecordedFrame;

    fn acquire(&mut self) -> Result<RecordedFrame, SinkError> {
        let mut state = self.log.lock();
        if state.failing_acquires > 0 {
            state.failing_acquires -= 1;
            state.acquire_failures += 1;
            return Err(SinkError::Acquire("injected failure".into()));
        }
        Ok(RecordedFrame {
            size: self.size,
            calls: Vec::new(),
        })
    }

    fn present(&mut self, frame: RecordedFrame) -> Result<(), SinkError> {
        self.log.lock().frames.push(frame);
        Ok(())
    }

    fn resized(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }
}
