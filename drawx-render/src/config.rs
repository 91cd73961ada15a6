//! Render configuration.

use serde::{Deserialize, Serialize};

use drawx_core::{Rgba, EDGE_WIDTH};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Logical canvas edge in stored units (default: 683)
    pub edge_width: f64,
    /// Stroke width in logical units; drawn as `base_stroke_width / scale_ratio`
    /// pixels (default: 4)
    pub base_stroke_width: f64,
    pub background: Rgba,
    /// Log a frame summary every N presented frames, 0 to disable (default: 300)
    pub stats_log_interval: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            edge_width: EDGE_WIDTH,
            base_stroke_width: 4.0,
            background: Rgba::WHITE,
            stats_log_interval: 300,
        }
    }
}

impl RenderConfig {
    /// Defaults with periodic logging off.
    pub fn for_testing() -> Self {
        Self {
            stats_log_interval: 0,
            ..Self::default()
        }
    }
}
