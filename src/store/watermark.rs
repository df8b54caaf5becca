//! Auto-scaling bounds and the undefined-value sentinel.

use serde::{Deserialize, Serialize};

/// Marks a cell that has never been written.
pub const NOT_DEFINED: f32 = -66666.0;
/// Largest value admitted to the display.
pub const MAX_DATA: f32 = 65535.0;
/// Smallest value admitted to the display.
pub const MIN_DATA: f32 = -65535.0;
/// Default high watermark.
pub const HI_WATER: f32 = 10.0;
/// Default low watermark.
pub const LO_WATER: f32 = 0.0;

/// Whether `value` holds data rather than the sentinel.
pub fn is_defined(value: f32) -> bool {
    value > NOT_DEFINED + 1.0
}

/// Clamp a defined value into the displayable range.
pub fn clamp_data(value: f32) -> f32 {
    if is_defined(value) { value.clamp(MIN_DATA, MAX_DATA) } else { value }
}

/// Running high/low bounds of everything written to the snapshot.
///
/// The high mark only rises and the low mark only falls until
/// [`Watermarks::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Watermarks {
    pub high: f32,
    pub low: f32,
    default_high: f32,
    default_low: f32,
}

impl Watermarks {
    pub fn new(high: f32, low: f32) -> Self {
        Self { high, low, default_high: high, default_low: low }
    }

    /// Widen the bounds to include a newly written value.
    pub fn observe(&mut self, value: f32) {
        if !is_defined(value) {
            return;
        }
        let value = clamp_data(value);
        if value > self.high {
            self.high = value;
        }
        if value < self.low {
            self.low = value;
        }
    }

    pub fn reset(&mut self) {
        self.high = self.default_high;
        self.low = self.default_low;
    }
}

impl Default for Watermarks {
    fn default() -> Self {
        Self::new(HI_WATER, LO_WATER)
    }
}
