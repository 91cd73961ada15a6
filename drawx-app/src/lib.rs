//! # drawx-app
//!
//! Session wiring for the drawing surface: pointer input becomes stroke
//! transactions, and one render loop per surface redraws whenever the store
//! changes.
//!
//! - [`session`]: `DrawSession`, the per-activity owner of everything below
//! - [`input`]: pointer events to stroke actions in canvas units
//! - [`writer`]: the four stroke operations, one transaction each
//! - [`config`]: `AppConfig` from JSON plus `DRAWX_*` overrides

pub mod config;
pub mod error;
pub mod input;
pub mod session;
pub mod writer;

pub use config::{AppConfig, ConfigError};
pub use error::AppError;
pub use input::{InputCapture, PointerEvent, PointerPhase, StrokeAction};
pub use session::DrawSession;
pub use writer::{StrokeWriter, WriteOutcome};
