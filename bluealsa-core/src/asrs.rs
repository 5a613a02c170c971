//! Paced clock (C2) — the audio sample-rate synchroniser ("ASRS") that
//! regulates constant-bit-rate output by sleeping the encoder worker until
//! wall-clock time has caught up with the PCM frames it has produced.

use std::time::{Duration, Instant};

/// Regulates CBR pacing for one worker.
///
/// `sync(frames)` blocks until `frames_since_t0 / rate` seconds have elapsed
/// from the monotonic reference latched at the first non-restart call.
/// Passing `frames = 0` restarts the reference (spec §4.2).
pub struct PacedClock {
    rate_hz: u32,
    t0: Option<Instant>,
    frames_total: u64,
    last_sync: Instant,
    busy_us: i64,
}

impl PacedClock {
    pub fn new(rate_hz: u32) -> Self {
        PacedClock {
            rate_hz: rate_hz.max(1),
            t0: None,
            frames_total: 0,
            last_sync: Instant::now(),
            busy_us: 0,
        }
    }

    /// Advance the pacer by `frames` PCM frames and sleep until schedule.
    ///
    /// Returns a positive "idle time used" in microseconds when it slept,
    /// and a non-positive value (how far behind, negated) when the caller
    /// is already late. `frames = 0` re-latches the reference and returns 0
    /// without sleeping.
    pub async fn sync(&mut self, frames: u32) -> i64 {
        let entry = Instant::now();
        self.busy_us = (entry - self.last_sync).as_micros() as i64;

        if frames == 0 {
            self.t0 = Some(entry);
            self.frames_total = 0;
            self.last_sync = entry;
            return 0;
        }

        let t0 = *self.t0.get_or_insert(entry);
        self.frames_total += frames as u64;
        let target =
            t0 + Duration::from_secs_f64(self.frames_total as f64 / self.rate_hz as f64);

        let result = if target > entry {
            tokio::time::sleep(target - entry).await;
            (target - entry).as_micros() as i64
        } else {
            -((entry - target).as_micros() as i64)
        };

        self.last_sync = Instant::now();
        result
    }

    /// Wall time between successive `sync` calls, i.e. the encoding cost of
    /// the last block.
    pub fn busy_microseconds(&self) -> i64 {
        self.busy_us
    }

    pub fn rate_hz(&self) -> u32 {
        self.rate_hz
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn advances_monotonically_with_frame_count() {
        let mut clock = PacedClock::new(44_100);
        let start = Instant::now();

        for _ in 0..10 {
            clock.sync(4_410).await; // 0.1 s worth of frames each call
        }

        let elapsed = start.elapsed();
        // 10 * 4410 frames / 44100 Hz = 1.0 s, allow a small scheduling slack.
        assert!(elapsed >= Duration::from_millis(990), "elapsed={elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn restart_relatches_reference() {
        let mut clock = PacedClock::new(44_100);
        clock.sync(44_100).await; // consumes 1s of virtual time
        clock.sync(0).await; // restart: should not demand the next second
        let start = Instant::now();
        clock.sync(4_410).await; // 0.1s from the new reference
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn behind_schedule_returns_non_positive() {
        let mut clock = PacedClock::new(44_100);
        clock.sync(4_410).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        let result = clock.sync(4_410).await;
        assert!(result <= 0);
    }
}
