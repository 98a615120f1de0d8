//! Platform seam
//!
//! The coordinator consumes the [`Platform`] capability: an event pump that
//! yields input and window-lifecycle events. This module also hosts the two
//! concurrency primitives shared across the engine: the cooperative
//! [`StopToken`] and the [`ThreadPool`] handle used to offload CPU-heavy
//! work.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::{EmberError, Result};
use crate::input::{ButtonState, Key, MouseButton};

/// Event produced by the platform event pump.
///
/// Pointer movement arrives in two distinct shapes, matching what windowing
/// systems report: `CursorMoved` carries the absolute cursor position within
/// the window, `MouseMotion` carries raw relative motion. Adapters emit
/// whichever their platform provides; consumers must not conflate the two.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlatformEvent {
    Key { key: Key, state: ButtonState },
    MouseButton { button: MouseButton, state: ButtonState },
    /// Absolute cursor position in window coordinates.
    CursorMoved { x: f32, y: f32 },
    /// Relative pointer motion since the previous motion event.
    MouseMotion { dx: f32, dy: f32 },
    MouseWheel { dx: f32, dy: f32 },
    WindowResized { width: u32, height: u32 },
    /// The last window was closed or the platform asked the engine to exit.
    CloseRequested,
}

/// Capability consumed by the coordinator; supplied externally.
pub trait Platform {
    /// Drains pending platform events, in arrival order.
    fn pump_events(&mut self) -> Vec<PlatformEvent>;

    /// True once the platform signaled termination (last window closed).
    fn close_requested(&self) -> bool;

    /// Signals the platform that the engine is shutting down (stop pumping,
    /// release windows). Default is a no-op.
    fn shutdown(&mut self) {}
}

/// Queue-backed platform for tests and headless runs. Events are injected by
/// the host and drained by the coordinator's Input phase.
#[derive(Debug, Default)]
pub struct HeadlessPlatform {
    queue: VecDeque<PlatformEvent>,
    closed: bool,
}

impl HeadlessPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_event(&mut self, event: PlatformEvent) {
        if matches!(event, PlatformEvent::CloseRequested) {
            self.closed = true;
        }
        self.queue.push_back(event);
    }
}

impl Platform for HeadlessPlatform {
    fn pump_events(&mut self) -> Vec<PlatformEvent> {
        self.queue.drain(..).collect()
    }

    fn close_requested(&self) -> bool {
        self.closed
    }
}

// ============================================================================
// Cooperative cancellation
// ============================================================================

/// Source side of the cooperative cancellation pair.
#[derive(Debug, Clone, Default)]
pub struct StopSource {
    flag: Arc<AtomicBool>,
}

impl StopSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; all tokens minted from this source observe it.
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn token(&self) -> StopToken {
        StopToken { flag: Arc::clone(&self.flag) }
    }
}

/// Cooperative cancellation signal. Operations check it at well-defined
/// points and return a canceled result without mutating shared state.
#[derive(Debug, Clone)]
pub struct StopToken {
    flag: Arc<AtomicBool>,
}

impl StopToken {
    /// A token that never reports a stop, for callers without cancellation.
    #[must_use]
    pub fn never() -> Self {
        Self { flag: Arc::new(AtomicBool::new(false)) }
    }

    #[inline]
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

// ============================================================================
// Thread pool
// ============================================================================

/// Handle to the blocking-work pool. CPU-heavy work (asset cooking, content
/// hashing, texture decode) goes through [`run`](Self::run); everything else
/// stays on the coordinator thread.
#[derive(Debug, Clone)]
pub struct ThreadPool {
    handle: tokio::runtime::Handle,
}

impl ThreadPool {
    /// Captures the ambient tokio runtime. Must be called from within a
    /// runtime context.
    #[must_use]
    pub fn current() -> Self {
        Self { handle: tokio::runtime::Handle::current() }
    }

    #[must_use]
    pub fn from_handle(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Offloads `f` to a blocking thread. The token is checked before the
    /// offload and handed to `f` for mid-task checks.
    pub async fn run<T, F>(&self, f: F, token: StopToken) -> Result<T>
    where
        F: FnOnce(StopToken) -> T + Send + 'static,
        T: Send + 'static,
    {
        if token.stop_requested() {
            return Err(EmberError::Canceled);
        }
        self.handle
            .spawn_blocking(move || f(token))
            .await
            .map_err(|error| EmberError::TaskJoin(error.to_string()))
    }
}
