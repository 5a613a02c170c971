use std::ops::Add;
use std::time::Duration;

/// A delay expressed in tenths of a millisecond, the unit spec §3/§6 uses for
/// every reported latency (codec-intrinsic, processing, link).
///
/// Kept as a distinct type rather than a bare `i32` so a delay can't be added
/// to a plain millisecond count by accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct DeciMs(pub i32);

impl DeciMs {
    pub const ZERO: DeciMs = DeciMs(0);

    pub fn from_millis(ms: f64) -> Self {
        DeciMs((ms * 10.0).round() as i32)
    }

    pub fn as_millis_f64(self) -> f64 {
        self.0 as f64 / 10.0
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_micros((self.0.max(0) as u64) * 100)
    }

    /// Delay contributed by `frames` PCM frames at `rate_hz`.
    pub fn from_frames(frames: u32, rate_hz: u32) -> Self {
        DeciMs(((frames as u64 * 10_000) / rate_hz.max(1) as u64) as i32)
    }
}

impl Add for DeciMs {
    type Output = DeciMs;
    fn add(self, rhs: DeciMs) -> DeciMs {
        DeciMs(self.0 + rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_to_decims() {
        // 73 frames at 44100 Hz ~= 1.655 ms = 16.55 dms
        let d = DeciMs::from_frames(73, 44_100);
        assert_eq!(d.0, 16);
    }

    #[test]
    fn addition() {
        assert_eq!(DeciMs(10) + DeciMs(5), DeciMs(15));
    }
}
