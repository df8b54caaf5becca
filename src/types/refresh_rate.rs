//! Refresh rate control for display consumers

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often a consumer wants to see the display state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RefreshRate {
    /// Every change, as fast as frames arrive
    EveryFrame,

    /// At most this many views per second
    Max(u32),
}

impl RefreshRate {
    /// Cap the requested rate at the configured maximum frame rate.
    ///
    /// `EveryFrame` is capped too: a renderer never needs more views than it
    /// can draw. A cap of zero disables capping.
    pub fn capped(self, max_frame_rate: u32) -> Self {
        match (self, max_frame_rate) {
            (rate, 0) => rate,
            (RefreshRate::EveryFrame, cap) => RefreshRate::Max(cap),
            (RefreshRate::Max(0), _) => RefreshRate::EveryFrame,
            (RefreshRate::Max(hz), cap) => RefreshRate::Max(hz.min(cap)),
        }
    }

    /// Interval between views, if throttled.
    pub fn interval(self) -> Option<Duration> {
        match self {
            RefreshRate::EveryFrame | RefreshRate::Max(0) => None,
            RefreshRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}
