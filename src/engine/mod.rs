//! Engine core: frame context, module extension point, module manager, and
//! the frame coordinator.

pub mod context;
pub mod coordinator;
pub mod module;
pub mod module_manager;

pub use context::{
    EngineTag, ErrorReport, FrameContext, FrameSnapshot, ModuleTiming, SnapshotValidation,
    UnifiedSnapshot,
};
pub use coordinator::{Engine, FRAMES_IN_FLIGHT};
pub use module::{EngineModule, ModuleFuture, ModulePriority, ModuleTypeId, ready_ok};
pub use module_manager::{ModuleEvent, ModuleManager, ModuleSubscription};
