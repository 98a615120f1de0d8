//! Input actions and triggers
//!
//! An [`Action`] is the gameplay-facing end of the input pipeline: mappings
//! feed it values when their slot actuates, and its triggers decide when it
//! counts as fired this frame. Triggers come in three behaviors: explicit
//! (at least one must fire), implicit (all must be satisfied), and blocker
//! (any firing one suppresses the action).

use std::time::{Duration, Instant};

use glam::Vec2;

/// Value carried by an action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActionValue {
    Bool(bool),
    Axis1(f32),
    Axis2(Vec2),
}

impl ActionValue {
    /// True when the value is past the actuation threshold.
    #[must_use]
    pub fn is_actuated(&self) -> bool {
        const THRESHOLD: f32 = 0.5;
        match self {
            ActionValue::Bool(value) => *value,
            ActionValue::Axis1(value) => value.abs() >= THRESHOLD,
            ActionValue::Axis2(value) => value.length_squared() > 0.0,
        }
    }

    /// The neutral value for a given type.
    #[must_use]
    pub fn neutral(value_type: ActionValueType) -> Self {
        match value_type {
            ActionValueType::Bool => ActionValue::Bool(false),
            ActionValueType::Axis1 => ActionValue::Axis1(0.0),
            ActionValueType::Axis2 => ActionValue::Axis2(Vec2::ZERO),
        }
    }
}

/// Declared value type of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionValueType {
    Bool,
    Axis1,
    Axis2,
}

/// A named, typed input action.
#[derive(Debug)]
pub struct Action {
    name: String,
    value_type: ActionValueType,
    consumes_input: bool,
    triggered: bool,
    value: ActionValue,
}

impl Action {
    #[must_use]
    pub fn new(name: impl Into<String>, value_type: ActionValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            consumes_input: false,
            triggered: false,
            value: ActionValue::neutral(value_type),
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn value_type(&self) -> ActionValueType {
        self.value_type
    }

    /// A consuming action stops event routing to lower-priority mappings
    /// once it triggers.
    pub fn set_consumes_input(&mut self, consumes: bool) {
        self.consumes_input = consumes;
    }

    #[inline]
    #[must_use]
    pub fn consumes_input(&self) -> bool {
        self.consumes_input
    }

    #[inline]
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    #[inline]
    #[must_use]
    pub fn value(&self) -> ActionValue {
        self.value
    }

    pub(crate) fn trigger_with(&mut self, value: ActionValue) {
        self.triggered = true;
        self.value = value;
    }

    /// Resets per-frame trigger state; called at frame start.
    pub(crate) fn start_frame(&mut self) {
        self.triggered = false;
        self.value = ActionValue::neutral(self.value_type);
    }
}

/// How a trigger participates in the firing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerBehavior {
    /// At least one explicit trigger must fire.
    Explicit,
    /// Every implicit trigger must be satisfied.
    Implicit,
    /// Any firing blocker suppresses the action.
    Blocker,
}

#[derive(Debug)]
enum TriggerKind {
    /// Fires on the actuation edge.
    Pressed { was_actuated: bool },
    /// Fires on the release edge.
    Released { was_actuated: bool },
    /// Fires for as long as the slot is actuated.
    Down,
    /// Fires when a press is released within the threshold window.
    Tap { pressed_at: Option<Instant>, threshold: Duration },
    /// Fires once the slot has been held for the duration.
    Hold { held_since: Option<Instant>, duration: Duration, fired: bool },
}

/// A single trigger attached to a mapping.
#[derive(Debug)]
pub struct Trigger {
    kind: TriggerKind,
    behavior: TriggerBehavior,
}

impl Trigger {
    #[must_use]
    pub fn pressed() -> Self {
        Self { kind: TriggerKind::Pressed { was_actuated: false }, behavior: TriggerBehavior::Explicit }
    }

    #[must_use]
    pub fn released() -> Self {
        Self {
            kind: TriggerKind::Released { was_actuated: false },
            behavior: TriggerBehavior::Explicit,
        }
    }

    #[must_use]
    pub fn down() -> Self {
        Self { kind: TriggerKind::Down, behavior: TriggerBehavior::Explicit }
    }

    /// Tap with the default 300 ms window.
    #[must_use]
    pub fn tap() -> Self {
        Self::tap_within(Duration::from_millis(300))
    }

    #[must_use]
    pub fn tap_within(threshold: Duration) -> Self {
        Self {
            kind: TriggerKind::Tap { pressed_at: None, threshold },
            behavior: TriggerBehavior::Explicit,
        }
    }

    #[must_use]
    pub fn hold(duration: Duration) -> Self {
        Self {
            kind: TriggerKind::Hold { held_since: None, duration, fired: false },
            behavior: TriggerBehavior::Explicit,
        }
    }

    #[must_use]
    pub fn with_behavior(mut self, behavior: TriggerBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    #[inline]
    #[must_use]
    pub fn behavior(&self) -> TriggerBehavior {
        self.behavior
    }

    /// Feeds the current actuation state; returns true when the trigger
    /// fires for this update.
    pub fn evaluate(&mut self, actuated: bool, now: Instant) -> bool {
        match &mut self.kind {
            TriggerKind::Pressed { was_actuated } => {
                let fired = actuated && !*was_actuated;
                *was_actuated = actuated;
                fired
            }
            TriggerKind::Released { was_actuated } => {
                let fired = !actuated && *was_actuated;
                *was_actuated = actuated;
                fired
            }
            TriggerKind::Down => actuated,
            TriggerKind::Tap { pressed_at, threshold } => {
                if actuated {
                    if pressed_at.is_none() {
                        *pressed_at = Some(now);
                    }
                    false
                } else if let Some(start) = pressed_at.take() {
                    now.duration_since(start) <= *threshold
                } else {
                    false
                }
            }
            TriggerKind::Hold { held_since, duration, fired } => {
                if actuated {
                    let start = held_since.get_or_insert(now);
                    if !*fired && now.duration_since(*start) >= *duration {
                        *fired = true;
                        return true;
                    }
                    false
                } else {
                    *held_since = None;
                    *fired = false;
                    false
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pressed_fires_on_edge_only() {
        let mut trigger = Trigger::pressed();
        let now = Instant::now();
        assert!(trigger.evaluate(true, now));
        assert!(!trigger.evaluate(true, now));
        assert!(!trigger.evaluate(false, now));
        assert!(trigger.evaluate(true, now));
    }

    #[test]
    fn released_fires_on_release_edge() {
        let mut trigger = Trigger::released();
        let now = Instant::now();
        assert!(!trigger.evaluate(true, now));
        assert!(trigger.evaluate(false, now));
        assert!(!trigger.evaluate(false, now));
    }

    #[test]
    fn tap_fires_within_window() {
        let mut trigger = Trigger::tap_within(Duration::from_millis(300));
        let start = Instant::now();
        assert!(!trigger.evaluate(true, start));
        assert!(trigger.evaluate(false, start + Duration::from_millis(100)));
    }

    #[test]
    fn tap_misses_outside_window() {
        let mut trigger = Trigger::tap_within(Duration::from_millis(300));
        let start = Instant::now();
        assert!(!trigger.evaluate(true, start));
        assert!(!trigger.evaluate(false, start + Duration::from_millis(400)));
    }

    #[test]
    fn hold_fires_once_after_duration() {
        let mut trigger = Trigger::hold(Duration::from_millis(200));
        let start = Instant::now();
        assert!(!trigger.evaluate(true, start));
        assert!(trigger.evaluate(true, start + Duration::from_millis(250)));
        assert!(!trigger.evaluate(true, start + Duration::from_millis(300)));
        assert!(!trigger.evaluate(false, start + Duration::from_millis(350)));
    }

    #[test]
    fn action_value_actuation() {
        assert!(ActionValue::Bool(true).is_actuated());
        assert!(!ActionValue::Bool(false).is_actuated());
        assert!(ActionValue::Axis1(0.7).is_actuated());
        assert!(!ActionValue::Axis1(0.2).is_actuated());
        assert!(ActionValue::Axis2(Vec2::new(0.0, 1.0)).is_actuated());
    }
}
