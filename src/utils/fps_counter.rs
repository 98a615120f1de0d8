//! Rolling FPS counter used for the periodic engine health summary.

use std::time::{Duration, Instant};

pub struct FpsCounter {
    window_start: Instant,
    frames_in_window: u32,
    /// FPS measured over the last completed window.
    pub fps: f32,
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl FpsCounter {
    #[must_use]
    pub fn new() -> Self {
        Self { window_start: Instant::now(), frames_in_window: 0, fps: 0.0 }
    }

    /// Counts one frame; returns the measured FPS when a one-second window
    /// completed, for the caller to log.
    pub fn frame(&mut self) -> Option<f32> {
        self.frames_in_window += 1;
        let elapsed = self.window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            self.fps = self.frames_in_window as f32 / elapsed.as_secs_f32();
            self.frames_in_window = 0;
            self.window_start = Instant::now();
            Some(self.fps)
        } else {
            None
        }
    }
}
