//! Frame timing
//!
//! [`FrameTimer`] tracks per-frame deltas the way the coordinator needs
//! them: the raw delta is clamped to a ceiling so a debugger pause or hitch
//! cannot inject a giant step, and a fixed-size sample history provides a
//! smoothed delta for health reporting.

use std::time::{Duration, Instant};

/// Number of samples in the smoothing window.
const TIMING_SAMPLES: usize = 16;

/// Ceiling applied to the raw frame delta.
const MAX_RAW_DELTA: Duration = Duration::from_millis(50);

/// Timer for tracking frame deltas and elapsed time.
pub struct FrameTimer {
    start_time: Instant,
    last_update: Instant,
    history: [Duration; TIMING_SAMPLES],
    history_index: usize,
    /// Clamped delta of the last tick
    pub delta: Duration,
    /// Total elapsed time since creation
    pub elapsed: Duration,
    /// Total number of ticks
    pub frame_count: u64,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTimer {
    /// Creates a new timer starting from now. The history is seeded at 60 Hz
    /// so early smoothed readings are sensible.
    #[must_use]
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start_time: now,
            last_update: now,
            history: [Duration::from_micros(16_667); TIMING_SAMPLES],
            history_index: 0,
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Advances the timer; returns the clamped delta since the last tick.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let raw = now - self.last_update;
        self.delta = raw.min(MAX_RAW_DELTA);
        self.elapsed = now - self.start_time;
        self.last_update = now;
        self.frame_count += 1;

        self.history[self.history_index] = self.delta;
        self.history_index = (self.history_index + 1) % TIMING_SAMPLES;
        self.delta
    }

    /// Average delta over the smoothing window.
    #[must_use]
    pub fn smoothed_delta(&self) -> Duration {
        let total: Duration = self.history.iter().sum();
        total / TIMING_SAMPLES as u32
    }

    #[must_use]
    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_advances_and_clamps() {
        let mut timer = FrameTimer::new();
        std::thread::sleep(Duration::from_millis(1));
        let delta = timer.tick();
        assert!(delta >= Duration::from_millis(1));
        assert!(delta <= MAX_RAW_DELTA);
        assert_eq!(timer.frame_count, 1);
    }

    #[test]
    fn smoothed_delta_reflects_history() {
        let timer = FrameTimer::new();
        // Freshly seeded at 60 Hz.
        let smoothed = timer.smoothed_delta();
        assert_eq!(smoothed, Duration::from_micros(16_667));
    }
}
