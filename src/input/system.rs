//! Input system module
//!
//! The engine-provided module that turns platform events into triggered
//! actions. Events injected by the coordinator are routed through active
//! mapping contexts in descending priority order during the Input phase,
//! honoring consumption across contexts; the resulting per-frame
//! [`InputSnapshot`] is what the coordinator publishes into the frame
//! context after the phase joins.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use glam::Vec2;

use crate::core::phase::PhaseMask;
use crate::engine::context::FrameContext;
use crate::engine::module::{EngineModule, ModuleFuture, ModulePriority, ModuleTypeId, ready_ok};
use crate::errors::Result;
use crate::input::action::{Action, ActionValue, ActionValueType};
use crate::input::mapping::{ActionHandle, InputMappingContext};
use crate::input::state::InputState;
use crate::platform::PlatformEvent;

/// Immutable per-frame view of input, safe to share with parallel readers.
#[derive(Debug, Clone)]
pub struct InputSnapshot {
    actions: Vec<ActionSnapshot>,
    /// Absolute cursor position, when the platform reported one.
    pub cursor_position: Option<Vec2>,
    /// Relative pointer motion accumulated this frame.
    pub motion_delta: Vec2,
    /// Wheel movement accumulated this frame.
    pub wheel_delta: Vec2,
}

#[derive(Debug, Clone)]
struct ActionSnapshot {
    name: String,
    triggered: bool,
    value: ActionValue,
}

impl InputSnapshot {
    #[must_use]
    pub fn is_triggered(&self, action: &str) -> bool {
        self.actions.iter().any(|a| a.name == action && a.triggered)
    }

    #[must_use]
    pub fn value_of(&self, action: &str) -> Option<ActionValue> {
        self.actions.iter().find(|a| a.name == action).map(|a| a.value)
    }
}

struct ContextSlot {
    priority: i32,
    active: bool,
    context: InputMappingContext,
}

/// The input subsystem, registered as a critical engine module.
pub struct InputSystem {
    state: InputState,
    actions: Vec<ActionHandle>,
    contexts: Vec<ContextSlot>,
    pending: VecDeque<PlatformEvent>,
    snapshot: Option<Arc<InputSnapshot>>,
}

impl Default for InputSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSystem {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: InputState::new(),
            actions: Vec::new(),
            contexts: Vec::new(),
            pending: VecDeque::new(),
            snapshot: None,
        }
    }

    /// Creates and registers an action, returning the shared handle used to
    /// build mappings.
    pub fn create_action(&mut self, name: &str, value_type: ActionValueType) -> ActionHandle {
        let action = Rc::new(RefCell::new(Action::new(name, value_type)));
        self.actions.push(Rc::clone(&action));
        action
    }

    /// Registers an externally-built action.
    pub fn add_action(&mut self, action: ActionHandle) {
        self.actions.push(action);
    }

    /// Adds a mapping context at the given priority (higher routes first).
    /// Contexts start inactive.
    pub fn add_mapping_context(&mut self, context: InputMappingContext, priority: i32) {
        self.contexts.push(ContextSlot { priority, active: false, context });
        self.contexts.sort_by_key(|slot| std::cmp::Reverse(slot.priority));
    }

    pub fn activate_mapping_context(&mut self, name: &str) {
        self.set_context_active(name, true);
    }

    pub fn deactivate_mapping_context(&mut self, name: &str) {
        self.set_context_active(name, false);
    }

    fn set_context_active(&mut self, name: &str, active: bool) {
        for slot in &mut self.contexts {
            if slot.context.name() == name {
                slot.active = active;
                return;
            }
        }
        log::warn!("InputSystem: unknown mapping context '{name}'");
    }

    /// Queues a platform event for the next Input phase. Called by the
    /// coordinator (or tests) before the phase dispatch.
    pub fn inject_event(&mut self, event: PlatformEvent) {
        self.pending.push_back(event);
    }

    /// The snapshot built by the last Input phase.
    #[must_use]
    pub fn current_snapshot(&self) -> Option<Arc<InputSnapshot>> {
        self.snapshot.clone()
    }

    /// Low-level state container, for direct queries.
    #[must_use]
    pub fn state(&self) -> &InputState {
        &self.state
    }

    /// Drains queued events through the active contexts and rebuilds the
    /// snapshot.
    fn process_events(&mut self) {
        let now = Instant::now();
        while let Some(event) = self.pending.pop_front() {
            self.state.apply(&event);

            // Route through active contexts, highest priority first. A
            // triggered consuming action stops routing for this event.
            for slot in &mut self.contexts {
                if !slot.active {
                    continue;
                }
                if slot.context.handle_event(&event, now) {
                    break;
                }
            }
        }

        let actions = self
            .actions
            .iter()
            .map(|action| {
                let action = action.borrow();
                ActionSnapshot {
                    name: action.name().to_string(),
                    triggered: action.is_triggered(),
                    value: action.value(),
                }
            })
            .collect();
        self.snapshot = Some(Arc::new(InputSnapshot {
            actions,
            cursor_position: self.state.cursor_position(),
            motion_delta: self.state.motion_delta(),
            wheel_delta: self.state.wheel_delta(),
        }));
    }
}

impl EngineModule for InputSystem {
    fn module_type_id(&self) -> ModuleTypeId {
        ModuleTypeId::of::<InputSystem>()
    }

    fn name(&self) -> &str {
        "InputSystem"
    }

    fn priority(&self) -> ModulePriority {
        // Input runs before application modules in shared phases.
        ModulePriority(-1000)
    }

    fn is_critical(&self) -> bool {
        true
    }

    fn supported_phases(&self) -> PhaseMask {
        PhaseMask::FRAME_START | PhaseMask::INPUT | PhaseMask::FRAME_END
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
        Some(self)
    }

    fn on_frame_start(&mut self, _ctx: &FrameContext) -> Result<()> {
        self.state.begin_frame();
        for action in &self.actions {
            action.borrow_mut().start_frame();
        }
        Ok(())
    }

    fn on_input<'a>(&'a mut self, _ctx: &'a FrameContext) -> ModuleFuture<'a> {
        self.process_events();
        ready_ok()
    }

    fn on_frame_end(&mut self, _ctx: &FrameContext) -> Result<()> {
        Ok(())
    }
}
