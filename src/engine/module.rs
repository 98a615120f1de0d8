//! Engine module extension point
//!
//! An [`EngineModule`] is a unit of per-phase behavior: it declares the
//! phases it subscribes to through a [`PhaseMask`], an ascending execution
//! priority, and whether it is critical (critical modules survive handler
//! failures; non-critical ones are unregistered).
//!
//! Handlers for synchronous-ordered phases are plain methods; handlers for
//! barriered phases return a [`ModuleFuture`] joined by the module manager
//! before the phase ends. Handlers report failures with `Err`; the dispatch
//! adapter converts those into typed error reports on the frame context.

use std::any::{Any, TypeId};
use std::sync::Arc;

use futures::future::LocalBoxFuture;

use crate::config::EngineConfig;
use crate::core::phase::{PhaseId, PhaseMask};
use crate::engine::context::{FrameContext, UnifiedSnapshot};
use crate::errors::Result;

/// Stable identity of a module type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleTypeId(TypeId);

impl ModuleTypeId {
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self(TypeId::of::<T>())
    }
}

/// Ascending execution order within a phase; lower runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ModulePriority(pub i32);

/// Awaitable returned by barriered-phase handlers. Local (not `Send`):
/// barriered concurrency is cooperative on the coordinator thread, and
/// CPU-heavy work goes through the explicit thread pool.
pub type ModuleFuture<'a> = LocalBoxFuture<'a, Result<()>>;

/// An immediately-ready successful handler result; the default for phases a
/// module does not override.
#[must_use]
pub fn ready_ok<'a>() -> ModuleFuture<'a> {
    Box::pin(std::future::ready(Ok(())))
}

/// A unit of per-phase behavior dispatched by the module manager.
#[allow(unused_variables)]
pub trait EngineModule {
    /// Stable type id used for error attribution and typed lookup.
    fn module_type_id(&self) -> ModuleTypeId;

    /// Display name; also the key for unregistration.
    fn name(&self) -> &str;

    fn priority(&self) -> ModulePriority {
        ModulePriority::default()
    }

    /// Critical modules are kept registered when a handler fails; their
    /// errors stay visible. Non-critical modules are removed on failure.
    fn is_critical(&self) -> bool {
        false
    }

    /// Phases this module participates in.
    fn supported_phases(&self) -> PhaseMask;

    /// Called at registration. Returning false rejects the registration and
    /// the module is dropped.
    fn on_attached(&mut self, config: &EngineConfig) -> bool {
        true
    }

    /// Called at unregistration and engine teardown (reverse attach order).
    fn on_shutdown(&mut self) {}

    /// Typed self-access for coordinator-known modules (the input system).
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }

    // ========================================================================
    // Synchronous ordered handlers
    // ========================================================================

    fn on_frame_start(&mut self, ctx: &FrameContext) -> Result<()> {
        Ok(())
    }

    fn on_snapshot(&mut self, ctx: &FrameContext) -> Result<()> {
        Ok(())
    }

    fn on_frame_end(&mut self, ctx: &FrameContext) -> Result<()> {
        Ok(())
    }

    // ========================================================================
    // Barriered handlers
    // ========================================================================

    fn on_input<'a>(&'a mut self, ctx: &'a FrameContext) -> ModuleFuture<'a> {
        ready_ok()
    }

    fn on_fixed_simulation<'a>(&'a mut self, ctx: &'a FrameContext) -> ModuleFuture<'a> {
        ready_ok()
    }

    fn on_gameplay<'a>(&'a mut self, ctx: &'a FrameContext) -> ModuleFuture<'a> {
        ready_ok()
    }

    fn on_scene_mutation<'a>(&'a mut self, ctx: &'a FrameContext) -> ModuleFuture<'a> {
        ready_ok()
    }

    fn on_transform_propagation<'a>(&'a mut self, ctx: &'a FrameContext) -> ModuleFuture<'a> {
        ready_ok()
    }

    fn on_post_parallel<'a>(&'a mut self, ctx: &'a FrameContext) -> ModuleFuture<'a> {
        ready_ok()
    }

    fn on_gui_update<'a>(&'a mut self, ctx: &'a FrameContext) -> ModuleFuture<'a> {
        ready_ok()
    }

    fn on_pre_render<'a>(&'a mut self, ctx: &'a FrameContext) -> ModuleFuture<'a> {
        ready_ok()
    }

    fn on_render<'a>(&'a mut self, ctx: &'a FrameContext) -> ModuleFuture<'a> {
        ready_ok()
    }

    /// Ordered phase; dispatched sequentially in priority order but may
    /// return an awaitable that completes without suspending.
    fn on_compositing<'a>(&'a mut self, ctx: &'a FrameContext) -> ModuleFuture<'a> {
        ready_ok()
    }

    fn on_async_poll<'a>(&'a mut self, ctx: &'a FrameContext) -> ModuleFuture<'a> {
        ready_ok()
    }

    /// Deferred-pipelines phase: receives the published snapshot and no
    /// context; the read-only contract is structural.
    fn on_parallel_tasks(&mut self, snapshot: Arc<UnifiedSnapshot>) -> ModuleFuture<'_> {
        ready_ok()
    }
}

/// Invokes the handler for a synchronous-ordered phase.
pub(crate) fn invoke_sync(
    module: &mut dyn EngineModule,
    phase: PhaseId,
    ctx: &FrameContext,
) -> Result<()> {
    match phase {
        PhaseId::FrameStart => module.on_frame_start(ctx),
        PhaseId::Snapshot => module.on_snapshot(ctx),
        PhaseId::FrameEnd => module.on_frame_end(ctx),
        _ => unreachable!("{} is not dispatched synchronously", phase.name()),
    }
}

/// Invokes the handler for a barriered (or sequentially-awaited) phase.
pub(crate) fn invoke_barriered<'a>(
    module: &'a mut dyn EngineModule,
    phase: PhaseId,
    ctx: &'a FrameContext,
) -> ModuleFuture<'a> {
    match phase {
        PhaseId::Input => module.on_input(ctx),
        PhaseId::FixedSimulation => module.on_fixed_simulation(ctx),
        PhaseId::Gameplay => module.on_gameplay(ctx),
        PhaseId::SceneMutation => module.on_scene_mutation(ctx),
        PhaseId::TransformPropagation => module.on_transform_propagation(ctx),
        PhaseId::PostParallel => module.on_post_parallel(ctx),
        PhaseId::GuiUpdate => module.on_gui_update(ctx),
        PhaseId::PreRender => module.on_pre_render(ctx),
        PhaseId::Render => module.on_render(ctx),
        PhaseId::Compositing => module.on_compositing(ctx),
        PhaseId::AsyncPoll => module.on_async_poll(ctx),
        _ => unreachable!("{} has no barriered module handler", phase.name()),
    }
}
