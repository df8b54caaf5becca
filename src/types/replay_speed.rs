//! Replay speed multiplier

/// Playback speed for capture replay.
///
/// A requested multiplier of exactly zero means "unspecified" and becomes
/// 1.0; anything else is clamped into `[MIN, MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct ReplaySpeed(f64);

impl ReplaySpeed {
    pub const MIN: f64 = 0.01;
    pub const MAX: f64 = 100.0;

    /// Normalise a requested multiplier.
    pub fn new(multiplier: f64) -> Self {
        if multiplier == 0.0 || multiplier.is_nan() {
            return Self(1.0);
        }
        Self(multiplier.clamp(Self::MIN, Self::MAX))
    }

    /// The effective multiplier.
    pub fn multiplier(self) -> f64 {
        self.0
    }

    /// Scale a capture offset in microseconds to wall-clock microseconds,
    /// saturating at the `i64` range.
    pub fn scale_micros(self, offset_us: i64) -> i64 {
        let scaled = offset_us as f64 / self.0;
        if scaled >= i64::MAX as f64 {
            i64::MAX
        } else if scaled <= i64::MIN as f64 {
            i64::MIN
        } else {
            scaled as i64
        }
    }
}

impl Default for ReplaySpeed {
    fn default() -> Self {
        Self(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_is_identity() {
        assert_eq!(ReplaySpeed::new(0.0).multiplier(), 1.0);
    }

    #[test]
    fn out_of_range_is_clamped() {
        assert_eq!(ReplaySpeed::new(0.001).multiplier(), ReplaySpeed::MIN);
        assert_eq!(ReplaySpeed::new(500.0).multiplier(), ReplaySpeed::MAX);
        assert_eq!(ReplaySpeed::new(-3.0).multiplier(), ReplaySpeed::MIN);
    }

    #[test]
    fn double_speed_halves_offsets() {
        assert_eq!(ReplaySpeed::new(2.0).scale_micros(200_000), 100_000);
    }

    #[test]
    fn slow_replay_of_extreme_offsets_saturates() {
        let slowest = ReplaySpeed::new(ReplaySpeed::MIN);
        assert_eq!(slowest.scale_micros(i64::MAX), i64::MAX);
        assert_eq!(slowest.scale_micros(i64::MIN), i64::MIN);
    }

    proptest! {
        #[test]
        fn multiplier_always_in_range(requested in -1000.0f64..1000.0f64) {
            let speed = ReplaySpeed::new(requested).multiplier();
            prop_assert!((ReplaySpeed::MIN..=ReplaySpeed::MAX).contains(&speed));
        }
    }
}
