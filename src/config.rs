//! Engine configuration
//!
//! Plain-data configuration consumed by the frame coordinator. All options
//! are stable; see the fields for their semantics.

use std::time::Duration;

/// Fixed-timestep and pacing configuration.
#[derive(Debug, Clone, Copy)]
pub struct TimingConfig {
    /// Nominal fixed-step period for deterministic simulation.
    pub fixed_delta: Duration,
    /// Clamp for the fixed-step accumulator, preventing unbounded catch-up.
    pub max_accumulator: Duration,
    /// Maximum fixed substeps executed in a single frame.
    pub max_substeps: u32,
    /// Subtracted from the pacing deadline before sleeping, so the OS sleep
    /// overshoot lands before the deadline and the remainder is yield-polled.
    pub pacing_safety_margin: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            fixed_delta: Duration::from_micros(16_667),
            // Five fixed steps of headroom: after max_substeps steps the
            // accumulator is back at or below fixed_delta.
            max_accumulator: Duration::from_micros(83_335),
            max_substeps: 4,
            pacing_safety_margin: Duration::from_micros(500),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    /// Number of frames to run; `0` runs until [`crate::engine::Engine::stop`]
    /// or a platform termination signal.
    pub frame_count: u64,
    /// Pacing target in frames per second; `0` disables pacing.
    pub target_fps: u32,
    /// Fixed-step and pacing parameters.
    pub timing: TimingConfig,
}
