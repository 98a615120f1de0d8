//! Ember Engine
//!
//! A deterministic, phase-structured frame coordinator and its immediate
//! collaborators: the phase and barrier registry, the module manager, the
//! phase-gated frame context, the bindless resource registry with its
//! any-cache, the async asset import pipeline, the state-machine substrate,
//! and the input subsystem.
//!
//! The coordinator is single-threaded; parallelism within a frame is
//! barriered concurrency on awaitables, and CPU-heavy work runs on an
//! explicit thread pool. Graphics, windowing, and asset formats stay behind
//! narrow capability traits.

pub mod cache;
pub mod config;
pub mod core;
pub mod engine;
pub mod errors;
pub mod fsm;
pub mod graphics;
pub mod import;
pub mod input;
pub mod platform;
pub mod utils;

pub use cache::{AnyCache, DescriptorAllocator, FixedDescriptorAllocator, ResourceRegistry};
pub use config::{EngineConfig, TimingConfig};
pub use self::core::{
    AllowMutation, BarrierId, BindlessIndex, ExecutionModel, Generation, PhaseId, PhaseMask,
    VersionedBindlessHandle,
};
pub use engine::{
    Engine, EngineModule, FrameContext, ModulePriority, ModuleTiming, ModuleTypeId,
    UnifiedSnapshot,
};
pub use errors::{EmberError, Result};
pub use fsm::{Action, State, StateMachine, Status};
pub use graphics::{GraphicsBackend, NullGraphics, SurfaceId};
pub use import::{ImportPlan, ImportSession, WorkDispatcher};
pub use input::{InputSystem, Key, MouseButton};
pub use platform::{HeadlessPlatform, Platform, StopSource, StopToken, ThreadPool};
