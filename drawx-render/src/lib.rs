//! # drawx-render
//!
//! Turns the stroke collection into frames.
//!
//! ## Architecture
//!
//! ```text
//!  StrokeStore (drawx-store)
//!       │  changes() wakes
//!       ▼
//!  RenderLoop (worker thread)
//!       │  query_all()
//!       ▼
//!  scene::draw_scene()        ◀─── stroke → Path, color by name, width / ratio
//!       │
//!       ▼
//!  FrameSink::acquire → Canvas → FrameSink::present
//! ```
//!
//! ## Crate modules
//!
//! - [`canvas`]: `Canvas` / `FrameSink` contracts and the `Path` type
//! - [`scene`]: stroke → draw call conversion
//! - [`render_loop`]: the worker and its handle
//! - [`recording`]: sink that records draw calls (tests, headless)
//! - [`raster`]: software rasterizer sink

pub mod canvas;
pub mod config;
pub mod error;
pub mod raster;
pub mod recording;
pub mod render_loop;
pub mod scene;

pub use canvas::{Canvas, FrameSink, Path, PathCommand, StrokeStyle};
pub use config::RenderConfig;
pub use error::{RenderError, SinkError};
pub use raster::{FrontBuffer, RasterFrame, RasterSink};
pub use recording::{DrawCall, RecordedFrame, RecordingLog, RecordingSink};
pub use render_loop::{LoopOptions, LoopState, RenderCommand, RenderLoop, RenderLoopHandle, RenderStats};
pub use scene::{build_path, draw_scene, paint_color, FrameStats};
