//! Input state tracking
//!
//! Per-frame input state fed by [`PlatformEvent`]s. Button-like sources
//! (keyboard keys, mouse buttons) share one edge-tracking structure that
//! distinguishes held state from the press/release transitions of the
//! current frame; pointer data keeps the absolute cursor position apart from
//! accumulated relative motion, matching the two pointer event kinds the
//! platform seam emits.
//!
//! The mapping layer actuates on events as they are routed; this container
//! is the stable queryable view behind it and the source of the pointer
//! fields published in the input snapshot.

use glam::Vec2;
use rustc_hash::FxHashSet;
use std::hash::Hash;

use crate::platform::PlatformEvent;

/// Keyboard keys the engine routes. Layout-independent physical keys;
/// platform adapters translate their native codes into these.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    // Control & editing
    Escape,
    Tab,
    Backspace,
    Enter,
    Space,
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,

    // Arrows
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,

    // Modifiers
    ShiftLeft,
    ShiftRight,
    ControlLeft,
    ControlRight,
    AltLeft,
    AltRight,
    MetaLeft,
    MetaRight,

    // Digit row
    Digit0,
    Digit1,
    Digit2,
    Digit3,
    Digit4,
    Digit5,
    Digit6,
    Digit7,
    Digit8,
    Digit9,

    // Letters
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,

    // Function row
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
}

impl Key {
    /// True for shift/control/alt/meta keys.
    #[must_use]
    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            Key::ShiftLeft
                | Key::ShiftRight
                | Key::ControlLeft
                | Key::ControlRight
                | Key::AltLeft
                | Key::AltRight
                | Key::MetaLeft
                | Key::MetaRight
        )
    }
}

/// Mouse buttons. `Extra` covers side buttons beyond the standard three.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Extra(u8),
}

/// Transition direction of a button-like input.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

impl ButtonState {
    #[inline]
    #[must_use]
    pub fn is_pressed(self) -> bool {
        matches!(self, ButtonState::Pressed)
    }
}

/// Held state plus the press/release edges of the current frame, for one
/// class of button-like inputs.
///
/// A repeat of an already-held press is not a new edge; a release of a
/// button that was never held is ignored. Edges reset at frame start, held
/// state persists.
#[derive(Debug, Clone)]
struct ButtonTracker<B> {
    held: FxHashSet<B>,
    pressed_edges: FxHashSet<B>,
    released_edges: FxHashSet<B>,
}

impl<B> Default for ButtonTracker<B> {
    fn default() -> Self {
        Self {
            held: FxHashSet::default(),
            pressed_edges: FxHashSet::default(),
            released_edges: FxHashSet::default(),
        }
    }
}

impl<B: Copy + Eq + Hash> ButtonTracker<B> {
    fn begin_frame(&mut self) {
        self.pressed_edges.clear();
        self.released_edges.clear();
    }

    fn transition(&mut self, button: B, state: ButtonState) {
        match state {
            ButtonState::Pressed => {
                if self.held.insert(button) {
                    self.pressed_edges.insert(button);
                }
            }
            ButtonState::Released => {
                if self.held.remove(&button) {
                    self.released_edges.insert(button);
                }
            }
        }
    }

    fn is_held(&self, button: B) -> bool {
        self.held.contains(&button)
    }

    fn was_pressed(&self, button: B) -> bool {
        self.pressed_edges.contains(&button)
    }

    fn was_released(&self, button: B) -> bool {
        self.released_edges.contains(&button)
    }
}

/// Queryable input state for one frame.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    keys: ButtonTracker<Key>,
    buttons: ButtonTracker<MouseButton>,
    /// Absolute cursor position; `None` until the first `CursorMoved`.
    cursor: Option<Vec2>,
    /// Relative motion accumulated from `MouseMotion` events this frame.
    motion: Vec2,
    /// Wheel movement accumulated this frame.
    wheel: Vec2,
    surface_size: Vec2,
}

impl InputState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the per-frame accumulators (edges, motion, wheel). Held state
    /// and the cursor position carry over.
    pub fn begin_frame(&mut self) {
        self.keys.begin_frame();
        self.buttons.begin_frame();
        self.motion = Vec2::ZERO;
        self.wheel = Vec2::ZERO;
    }

    /// Folds one platform event into the state. This is the only write path;
    /// the input system calls it for every event it routes.
    pub fn apply(&mut self, event: &PlatformEvent) {
        match *event {
            PlatformEvent::Key { key, state } => self.keys.transition(key, state),
            PlatformEvent::MouseButton { button, state } => {
                self.buttons.transition(button, state);
            }
            PlatformEvent::CursorMoved { x, y } => self.cursor = Some(Vec2::new(x, y)),
            PlatformEvent::MouseMotion { dx, dy } => self.motion += Vec2::new(dx, dy),
            PlatformEvent::MouseWheel { dx, dy } => self.wheel += Vec2::new(dx, dy),
            PlatformEvent::WindowResized { width, height } => {
                self.surface_size = Vec2::new(width as f32, height as f32);
            }
            PlatformEvent::CloseRequested => {}
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// True while the key is held down.
    #[must_use]
    pub fn key_held(&self, key: Key) -> bool {
        self.keys.is_held(key)
    }

    /// True when the key went down this frame.
    #[must_use]
    pub fn key_pressed(&self, key: Key) -> bool {
        self.keys.was_pressed(key)
    }

    /// True when the key went up this frame.
    #[must_use]
    pub fn key_released(&self, key: Key) -> bool {
        self.keys.was_released(key)
    }

    /// True while the mouse button is held down.
    #[must_use]
    pub fn button_held(&self, button: MouseButton) -> bool {
        self.buttons.is_held(button)
    }

    /// True when the mouse button went down this frame.
    #[must_use]
    pub fn button_pressed(&self, button: MouseButton) -> bool {
        self.buttons.was_pressed(button)
    }

    /// True when the mouse button went up this frame.
    #[must_use]
    pub fn button_released(&self, button: MouseButton) -> bool {
        self.buttons.was_released(button)
    }

    /// Absolute cursor position, once the platform reported one.
    #[must_use]
    pub fn cursor_position(&self) -> Option<Vec2> {
        self.cursor
    }

    /// Relative pointer motion accumulated this frame.
    #[must_use]
    pub fn motion_delta(&self) -> Vec2 {
        self.motion
    }

    /// Wheel movement accumulated this frame.
    #[must_use]
    pub fn wheel_delta(&self) -> Vec2 {
        self.wheel
    }

    /// Window dimensions from the last resize event.
    #[must_use]
    pub fn surface_size(&self) -> Vec2 {
        self.surface_size
    }
}
