//! Software rasterizer sink.
//!
//! Frames are `0xAARRGGBB` pixel buffers. Lines are drawn by stamping filled
//! discs along each segment at a spacing of a quarter width, which gives
//! round caps and joins for free. Segments are clipped to the frame first, so
//! far off-canvas points cost no more than visible ones.
//!
//! ```text
//!   acquire() ── spare buffer (or new) ──► RasterFrame ── draw ──► present()
//!       ▲                                                            │
//!       └──────────── previous front buffer becomes spare ◄──────────┘
//! ```

use std::sync::{Arc, Mutex};

use drawx_core::Rgba;

use crate::canvas::{Canvas, FrameSink, Path, StrokeStyle};
use crate::error::SinkError;

#[derive(Debug, Clone, PartialEq)]
pub struct RasterFrame {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl RasterFrame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
        }
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(Rgba::from_argb(self.pixels[(y * self.width + x) as usize]))
    }

    fn blend(&mut self, x: u32, y: u32, src: Rgba) {
        let i = (y * self.width + x) as usize;
        if src.a == 255 {
            self.pixels[i] = src.to_argb();
            return;
        }
        let dst = Rgba::from_argb(self.pixels[i]);
        let a = src.a as u32;
        let inv = 255 - a;
        let mix = |s: u8, d: u8| ((s as u32 * a + d as u32 * inv) / 255) as u8;
        let out = Rgba::new(
            mix(src.r, dst.r),
            mix(src.g, dst.g),
            mix(src.b, dst.b),
            (a + dst.a as u32 * inv / 255).min(255) as u8,
        );
        self.pixels[i] = out.to_argb();
    }

    /// Fill a disc centered on `(cx, cy)`, sampling at pixel centers.
    fn stamp(&mut self, cx: f64, cy: f64, radius: f64, color: Rgba) {
        if radius <= 0.0 {
            return;
        }
        let x_min = (cx - radius).floor().max(0.0) as u32;
        let y_min = (cy - radius).floor().max(0.0) as u32;
        let x_max = ((cx + radius).ceil().max(0.0) as u32).min(self.width);
        let y_max = ((cy + radius).ceil().max(0.0) as u32).min(self.height);
        let r2 = radius * radius;
        for py in y_min..y_max {
            for px in x_min..x_max {
                let dx = px as f64 + 0.5 - cx;
                let dy = py as f64 + 0.5 - cy;
                if dx * dx + dy * dy <= r2 {
                    self.blend(px, py, color);
                }
            }
        }
    }
}

impl Canvas for RasterFrame {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self, color: Rgba) {
        self.pixels.fill(color.to_argb());
    }

    fn stroke_path(&mut self, path: &Path, style: &StrokeStyle) {
        // Keep hairlines visible.
        let radius = (style.width / 2.0).max(0.5);
        let spacing = (style.width / 4.0).max(0.5);
        let mut points = path.points();
        let Some(mut prev) = points.next() else {
            return;
        };
        // Discs centered outside this box cannot touch the frame.
        let bounds = (
            -radius,
            -radius,
            self.width as f64 + radius,
            self.height as f64 + radius,
        );
        self.stamp(prev.0, prev.1, radius, style.color);
        for next in points {
            if let Some((from, to)) = clip_segment(prev, next, bounds) {
                let (dx, dy) = (to.0 - from.0, to.1 - from.1);
                let steps = ((dx * dx + dy * dy).sqrt() / spacing).ceil().max(1.0) as u32;
                for s in 0..=steps {
                    let t = s as f64 / steps as f64;
                    self.stamp(from.0 + dx * t, from.1 + dy * t, radius, style.color);
                }
            }
            prev = next;
        }
    }
}

/// The part of segment `a → b` inside `(x0, y0, x1, y1)` (Liang-Barsky).
fn clip_segment(
    a: (f64, f64),
    b: (f64, f64),
    (x0, y0, x1, y1): (f64, f64, f64, f64),
) -> Option<((f64, f64), (f64, f64))> {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    if ![a.0, a.1, dx, dy].iter().all(|v| v.is_finite()) {
        return None;
    }
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for (p, q) in [(-dx, a.0 - x0), (dx, x1 - a.0), (-dy, a.1 - y0), (dy, y1 - a.1)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }
    Some((
        (a.0 + t0 * dx, a.1 + t0 * dy),
        (a.0 + t1 * dx, a.1 + t1 * dy),
    ))
}

/// Double-buffered in-memory surface. The presented frame is readable
/// through [`RasterSink::front`].
pub struct RasterSink {
    width: u32,
    height: u32,
    spare: Option<RasterFrame>,
    front: Arc<Mutex<Option<RasterFrame>>>,
    presented: u64,
}

impl RasterSink {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            spare: None,
            front: Arc::new(Mutex::new(None)),
            presented: 0,
        }
    }

    /// Shared view of the last presented frame.
    pub fn front(&self) -> FrontBuffer {
        FrontBuffer {
            inner: self.front.clone(),
        }
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl FrameSink for RasterSink {
    type Frame = RasterFrame;

    fn acquire(&mut self) -> Result<RasterFrame, SinkError> {
        if self.width == 0 || self.height == 0 {
            return Err(SinkError::SurfaceLost);
        }
        match self.spare.take() {
            Some(frame) if frame.size() == (self.width, self.height) => Ok(frame),
            _ => Ok(RasterFrame::new(self.width, self.height)),
        }
    }

    fn present(&mut self, frame: RasterFrame) -> Result<(), SinkError> {
        let mut front = self
            .front
            .lock()
            .map_err(|_| SinkError::Present("front buffer poisoned".into()))?;
        self.spare = front.replace(frame);
        self.presented += 1;
        Ok(())
    }

    fn resized(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.spare = None;
    }
}

/// Read handle on a [`RasterSink`]'s front buffer.
#[derive(Clone)]
pub struct FrontBuffer {
    inner: Arc<Mutex<Option<RasterFrame>>>,
}

impl FrontBuffer {
    /// Copy of the frame currently on screen.
    pub fn snapshot(&self) -> Option<RasterFrame> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
