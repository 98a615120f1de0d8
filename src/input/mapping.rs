//! Action mappings and mapping contexts
//!
//! An [`InputActionMapping`] binds one action to one input slot and carries
//! the triggers that decide when the slot's actuation fires the action. An
//! [`InputMappingContext`] is an ordered collection of mappings with an
//! activation flag; the input system routes events through active contexts
//! in priority order, honoring consumption.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use glam::Vec2;

use crate::input::action::{Action, ActionValue, Trigger, TriggerBehavior};
use crate::input::state::{ButtonState, Key, MouseButton};
use crate::platform::PlatformEvent;

/// A bindable input source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputSlot {
    Key(Key),
    MouseButton(MouseButton),
    /// Relative pointer motion (`PlatformEvent::MouseMotion`), as a 2D axis.
    /// Absolute cursor position is queried from the input state, not bound
    /// to actions.
    MouseMotion,
    /// Scroll wheel, as a 2D axis.
    MouseWheel,
    /// Scroll wheel up only, as a 1D axis.
    MouseWheelUp,
    /// Scroll wheel down only, as a 1D axis.
    MouseWheelDown,
}

impl InputSlot {
    /// Maps a platform event onto this slot's value, when relevant.
    fn value_for(self, event: &PlatformEvent) -> Option<ActionValue> {
        match (self, event) {
            (InputSlot::Key(slot_key), PlatformEvent::Key { key, state }) if slot_key == *key => {
                Some(ActionValue::Bool(*state == ButtonState::Pressed))
            }
            (InputSlot::MouseButton(slot_button), PlatformEvent::MouseButton { button, state })
                if slot_button == *button =>
            {
                Some(ActionValue::Bool(*state == ButtonState::Pressed))
            }
            (InputSlot::MouseMotion, PlatformEvent::MouseMotion { dx, dy }) => {
                Some(ActionValue::Axis2(Vec2::new(*dx, *dy)))
            }
            (InputSlot::MouseWheel, PlatformEvent::MouseWheel { dx, dy }) => {
                Some(ActionValue::Axis2(Vec2::new(*dx, *dy)))
            }
            (InputSlot::MouseWheelUp, PlatformEvent::MouseWheel { dy, .. }) => {
                Some(ActionValue::Axis1(dy.max(0.0)))
            }
            (InputSlot::MouseWheelDown, PlatformEvent::MouseWheel { dy, .. }) => {
                Some(ActionValue::Axis1((-dy).max(0.0)))
            }
            _ => None,
        }
    }
}

/// Shared handle to an action; mappings and the input system both hold one.
pub type ActionHandle = Rc<RefCell<Action>>;

/// Binds an action to a slot through a set of triggers.
pub struct InputActionMapping {
    action: ActionHandle,
    slot: InputSlot,
    triggers: Vec<Trigger>,
}

impl InputActionMapping {
    #[must_use]
    pub fn new(action: ActionHandle, slot: InputSlot) -> Self {
        Self { action, slot, triggers: Vec::new() }
    }

    #[must_use]
    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.triggers.push(trigger);
        self
    }

    pub fn add_trigger(&mut self, trigger: Trigger) {
        self.triggers.push(trigger);
    }

    #[inline]
    #[must_use]
    pub fn action(&self) -> &ActionHandle {
        &self.action
    }

    /// Routes one event. Returns true when the event actuated this mapping,
    /// triggered its action, and the action consumes input.
    pub fn handle_event(&mut self, event: &PlatformEvent, now: Instant) -> bool {
        let Some(value) = self.slot.value_for(event) else {
            return false;
        };
        let actuated = value.is_actuated();

        // A mapping without triggers fires on plain actuation.
        let fired = if self.triggers.is_empty() {
            actuated
        } else {
            let mut any_explicit_fired = false;
            let mut has_explicit = false;
            let mut implicit_ok = true;
            let mut blocked = false;
            for trigger in &mut self.triggers {
                let fired = trigger.evaluate(actuated, now);
                match trigger.behavior() {
                    TriggerBehavior::Explicit => {
                        has_explicit = true;
                        any_explicit_fired |= fired;
                    }
                    TriggerBehavior::Implicit => implicit_ok &= fired,
                    TriggerBehavior::Blocker => blocked |= fired,
                }
            }
            !blocked && implicit_ok && (!has_explicit || any_explicit_fired)
        };

        if fired {
            let mut action = self.action.borrow_mut();
            action.trigger_with(value);
            action.consumes_input()
        } else {
            false
        }
    }
}

/// Named, ordered collection of mappings.
pub struct InputMappingContext {
    name: String,
    mappings: Vec<InputActionMapping>,
}

impl InputMappingContext {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), mappings: Vec::new() }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_mapping(&mut self, mapping: InputActionMapping) {
        self.mappings.push(mapping);
    }

    /// Routes one event through the mappings in order. When a consuming
    /// action triggers, the remaining mappings do not see the event and the
    /// event is reported consumed.
    pub fn handle_event(&mut self, event: &PlatformEvent, now: Instant) -> bool {
        for mapping in &mut self.mappings {
            if mapping.handle_event(event, now) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::action::ActionValueType;

    fn action(name: &str) -> ActionHandle {
        Rc::new(RefCell::new(Action::new(name, ActionValueType::Bool)))
    }

    fn key_event(key: Key, state: ButtonState) -> PlatformEvent {
        PlatformEvent::Key { key, state }
    }

    #[test]
    fn mapping_triggers_action_on_press() {
        let jump = action("Jump");
        let mut mapping =
            InputActionMapping::new(Rc::clone(&jump), InputSlot::Key(Key::Space))
                .with_trigger(Trigger::pressed());

        mapping.handle_event(&key_event(Key::Space, ButtonState::Pressed), Instant::now());
        assert!(jump.borrow().is_triggered());
    }

    #[test]
    fn mapping_ignores_other_slots() {
        let jump = action("Jump");
        let mut mapping =
            InputActionMapping::new(Rc::clone(&jump), InputSlot::Key(Key::Space))
                .with_trigger(Trigger::pressed());

        mapping.handle_event(&key_event(Key::Enter, ButtonState::Pressed), Instant::now());
        assert!(!jump.borrow().is_triggered());
    }

    #[test]
    fn consumption_stops_context_routing() {
        let primary = action("Primary");
        primary.borrow_mut().set_consumes_input(true);
        let secondary = action("Secondary");

        let mut ctx = InputMappingContext::new("ctx");
        ctx.add_mapping(
            InputActionMapping::new(Rc::clone(&primary), InputSlot::Key(Key::Space))
                .with_trigger(Trigger::pressed()),
        );
        ctx.add_mapping(
            InputActionMapping::new(Rc::clone(&secondary), InputSlot::Key(Key::Space))
                .with_trigger(Trigger::pressed()),
        );

        let consumed = ctx.handle_event(&key_event(Key::Space, ButtonState::Pressed), Instant::now());
        assert!(consumed);
        assert!(primary.borrow().is_triggered());
        assert!(!secondary.borrow().is_triggered());
    }

    #[test]
    fn wheel_slots_split_directions() {
        let up = action("ZoomIn");
        let down = action("ZoomOut");
        let mut ctx = InputMappingContext::new("wheel");
        ctx.add_mapping(InputActionMapping::new(Rc::clone(&up), InputSlot::MouseWheelUp));
        ctx.add_mapping(InputActionMapping::new(Rc::clone(&down), InputSlot::MouseWheelDown));

        ctx.handle_event(&PlatformEvent::MouseWheel { dx: 0.0, dy: 1.0 }, Instant::now());
        assert!(up.borrow().is_triggered());
        assert!(!down.borrow().is_triggered());
        assert_eq!(up.borrow().value(), ActionValue::Axis1(1.0));
    }
}
