//! Input subsystem: low-level state, actions and triggers, mapping contexts,
//! and the engine module that ties them to the frame loop.

pub mod action;
pub mod mapping;
pub mod state;
pub mod system;

pub use action::{Action, ActionValue, ActionValueType, Trigger, TriggerBehavior};
pub use mapping::{ActionHandle, InputActionMapping, InputMappingContext, InputSlot};
pub use state::{ButtonState, InputState, Key, MouseButton};
pub use system::{InputSnapshot, InputSystem};
