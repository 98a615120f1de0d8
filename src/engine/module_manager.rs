//! Module manager
//!
//! Holds modules in registration (attach) order and dispatches them per
//! phase with the execution model the phase registry prescribes:
//!
//! - Synchronous phases run handlers one by one in priority order; each
//!   failure is converted to an error report as it happens.
//! - Barriered phases build one awaitable per module, join them all, then
//!   triage the collected errors as a batch. The module list is never
//!   modified while handlers run.
//! - The deferred-pipelines phase (ParallelTasks) hands each module the
//!   published snapshot instead of the context.
//!
//! PreRender carries a special ordering rule: all non-renderer modules run
//! and are awaited first, then the designated renderer module runs, so
//! per-view render state is fully published before the renderer consumes it.
//!
//! Failure triage: non-critical modules that reported errors are
//! unregistered and their errors cleared; critical modules stay registered
//! with their errors visible; reports without proper attribution are
//! normalized into a critical "bad module" report.

use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use futures::future::join_all;

use crate::config::EngineConfig;
use crate::core::phase::{ExecutionModel, PhaseId, phase_desc};
use crate::engine::context::{FrameContext, UnifiedSnapshot};
use crate::engine::module::{
    EngineModule, ModuleTypeId, invoke_barriered, invoke_sync,
};

type ModuleRc = Rc<RefCell<dyn EngineModule>>;
type SubscriberCallback = Rc<dyn Fn(&ModuleEvent)>;
type SubscriberList = Rc<RefCell<Vec<(u64, SubscriberCallback)>>>;

/// Notification payload for attach subscribers.
#[derive(Debug, Clone)]
pub struct ModuleEvent {
    pub type_id: ModuleTypeId,
    pub name: String,
}

/// Cancel-on-drop guard for an attach subscription.
pub struct ModuleSubscription {
    id: u64,
    list: Weak<RefCell<Vec<(u64, SubscriberCallback)>>>,
}

impl Drop for ModuleSubscription {
    fn drop(&mut self) {
        if let Some(list) = self.list.upgrade() {
            list.borrow_mut().retain(|(id, _)| *id != self.id);
        }
    }
}

/// Registry and per-phase dispatcher for engine modules.
pub struct ModuleManager {
    config: EngineConfig,
    /// Attach order; shutdown runs in reverse.
    modules: Vec<ModuleRc>,
    /// Per-phase buckets sorted ascending by priority.
    phase_cache: [Vec<ModuleRc>; PhaseId::COUNT],
    renderer_type: Option<ModuleTypeId>,
    subscribers: SubscriberList,
    next_subscriber_id: u64,
}

impl ModuleManager {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            modules: Vec::new(),
            phase_cache: std::array::from_fn(|_| Vec::new()),
            renderer_type: None,
            subscribers: Rc::new(RefCell::new(Vec::new())),
            next_subscriber_id: 1,
        }
    }

    /// Designates the module type that runs last in PreRender.
    pub fn designate_renderer(&mut self, type_id: ModuleTypeId) {
        self.renderer_type = Some(type_id);
    }

    /// Registers a module. `on_attached` runs first; on failure the module is
    /// dropped and false is returned. On success, attach subscribers are
    /// notified synchronously.
    pub fn register<M: EngineModule + 'static>(&mut self, mut module: M) -> bool {
        let name = module.name().to_string();
        log::info!("Registering module '{}' with priority {}", name, module.priority().0);

        if !module.on_attached(&self.config) {
            log::error!("Module '{name}' failed to initialize, and will not be registered");
            return false;
        }

        let rc: ModuleRc = Rc::new(RefCell::new(module));
        let event = {
            let module = rc.borrow();
            ModuleEvent { type_id: module.module_type_id(), name: module.name().to_string() }
        };
        self.modules.push(rc);
        self.rebuild_phase_cache();
        self.notify_attached(&event);
        true
    }

    /// Unregisters by name: the module leaves the list first, then
    /// `on_shutdown` runs. A panicking shutdown is caught and logged.
    pub fn unregister(&mut self, name: &str) {
        let Some(position) = self.modules.iter().position(|m| m.borrow().name() == name) else {
            return;
        };
        let victim = self.modules.remove(position);
        shutdown_module(&victim);
        self.rebuild_phase_cache();
    }

    /// Tears down all modules in reverse attach order.
    pub fn shutdown_all(&mut self) {
        while let Some(victim) = self.modules.pop() {
            log::info!("Module shutdown: '{}'", victim.borrow().name());
            shutdown_module(&victim);
        }
        self.rebuild_phase_cache();
    }

    #[must_use]
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn get_module(&self, name: &str) -> Option<ModuleRc> {
        self.modules.iter().find(|m| m.borrow().name() == name).cloned()
    }

    #[must_use]
    pub fn find_module_by_type(&self, type_id: ModuleTypeId) -> Option<ModuleRc> {
        self.modules.iter().find(|m| m.borrow().module_type_id() == type_id).cloned()
    }

    /// Module names in attach order.
    #[must_use]
    pub fn module_names(&self) -> Vec<String> {
        self.modules.iter().map(|m| m.borrow().name().to_string()).collect()
    }

    /// Registers a synchronous attach-notification callback. With
    /// `replay_existing`, already-registered modules are replayed in attach
    /// order before this returns. Dropping the subscription unregisters it.
    #[must_use]
    pub fn subscribe_module_attached(
        &mut self,
        callback: impl Fn(&ModuleEvent) + 'static,
        replay_existing: bool,
    ) -> ModuleSubscription {
        let id = self.next_subscriber_id;
        self.next_subscriber_id += 1;
        let callback: SubscriberCallback = Rc::new(callback);
        self.subscribers.borrow_mut().push((id, Rc::clone(&callback)));

        if replay_existing {
            for module in &self.modules {
                let event = {
                    let module = module.borrow();
                    ModuleEvent {
                        type_id: module.module_type_id(),
                        name: module.name().to_string(),
                    }
                };
                invoke_subscriber(&callback, &event, "replay");
            }
        }

        ModuleSubscription { id, list: Rc::downgrade(&self.subscribers) }
    }

    fn notify_attached(&self, event: &ModuleEvent) {
        // Snapshot so a callback dropping its own subscription cannot
        // invalidate the iteration.
        let callbacks: Vec<SubscriberCallback> =
            self.subscribers.borrow().iter().map(|(_, cb)| Rc::clone(cb)).collect();
        for callback in callbacks {
            invoke_subscriber(&callback, event, "module attach");
        }
    }

    fn rebuild_phase_cache(&mut self) {
        for bucket in &mut self.phase_cache {
            bucket.clear();
        }
        for module in &self.modules {
            let mask = module.borrow().supported_phases();
            for phase in PhaseId::ALL {
                if mask.has(phase) {
                    self.phase_cache[phase.index()].push(Rc::clone(module));
                }
            }
        }
        // Stable sort keeps attach order for equal priorities.
        for bucket in &mut self.phase_cache {
            bucket.sort_by_key(|m| m.borrow().priority());
        }
    }

    /// Dispatches the modules registered for `phase` with the execution model
    /// the registry prescribes, then triages reported errors.
    pub async fn execute_phase(&mut self, phase: PhaseId, ctx: &FrameContext) {
        debug_assert!(
            phase != PhaseId::ParallelTasks,
            "ParallelTasks must be executed via execute_parallel_tasks()"
        );

        let list = self.phase_cache[phase.index()].clone();
        match phase_desc(phase).execution_model {
            ExecutionModel::SynchronousOrdered | ExecutionModel::EngineInternal => match phase {
                PhaseId::FrameStart | PhaseId::Snapshot | PhaseId::FrameEnd => {
                    for module in &list {
                        run_sync_handler(module, phase, ctx);
                    }
                }
                PhaseId::Compositing => {
                    // Ordered phase with awaitable handlers: sequential await
                    // in priority order.
                    for module in &list {
                        run_barriered_handler(module, phase, ctx).await;
                    }
                }
                // Engine-only phases: no modules participate.
                _ => {}
            },
            ExecutionModel::BarrieredConcurrency => match phase {
                PhaseId::NetworkReconciliation => {
                    // Engine-side reconciliation only; no module handler.
                }
                PhaseId::PreRender => {
                    self.execute_pre_render(&list, ctx).await;
                }
                _ => {
                    let tasks =
                        list.iter().map(|module| run_barriered_handler(module, phase, ctx));
                    join_all(tasks).await;
                }
            },
            ExecutionModel::DeferredPipelines | ExecutionModel::Detached => {
                // ParallelTasks goes through execute_parallel_tasks; detached
                // services are started elsewhere.
            }
        }

        self.triage_errors(ctx);
    }

    /// Dispatches the ParallelTasks phase against the published snapshot.
    pub async fn execute_parallel_tasks(&mut self, ctx: &FrameContext, snapshot: &Arc<UnifiedSnapshot>) {
        let list = self.phase_cache[PhaseId::ParallelTasks.index()].clone();
        let tasks = list.iter().map(|module| async move {
            let (type_id, name) = identity_of(module);
            let result = {
                let mut guard = module.borrow_mut();
                let future = guard.on_parallel_tasks(Arc::clone(snapshot));
                future.await
            };
            if let Err(error) = result {
                report_handler_failure(ctx, type_id, &name, &error);
            }
        });
        join_all(tasks).await;
        self.triage_errors(ctx);
    }

    /// PreRender ordering contract: every non-renderer module completes
    /// before the renderer runs, so the renderer consumes fully published
    /// per-view state. Priority sorting alone cannot guarantee this in a
    /// barriered phase.
    async fn execute_pre_render(&self, list: &[ModuleRc], ctx: &FrameContext) {
        let renderer = self.renderer_type.and_then(|type_id| {
            list.iter().find(|m| m.borrow().module_type_id() == type_id).cloned()
        });

        let Some(renderer) = renderer else {
            log::error!("PreRender: no renderer module registered; skipping phase dispatch");
            return;
        };

        let others = list
            .iter()
            .filter(|m| !Rc::ptr_eq(m, &renderer))
            .map(|module| run_barriered_handler(module, PhaseId::PreRender, ctx));
        join_all(others).await;

        run_barriered_handler(&renderer, PhaseId::PreRender, ctx).await;
    }

    /// Per-error policy: keyed errors from non-critical modules unregister
    /// the module and clear its errors; keyed errors from critical modules
    /// stay visible; unkeyed errors attributable by type id are normalized
    /// into a critical bad-module report.
    fn triage_errors(&mut self, ctx: &FrameContext) {
        let errors = ctx.errors();
        if errors.is_empty() {
            return;
        }

        for error in errors {
            match error.source_key.as_deref() {
                Some(BAD_MODULE_KEY) => {}
                Some(key) => {
                    let Some(module) = self.get_module(key) else { continue };
                    let critical = module.borrow().is_critical();
                    if critical {
                        log::error!(
                            "Critical module '{key}' failed during {}: {}",
                            error.phase.name(),
                            error.message
                        );
                    } else {
                        log::warn!("Removing non-critical module '{key}': {}", error.message);
                        self.unregister(key);
                        ctx.clear_errors_from_source(error.source_type_id, Some(key));
                    }
                }
                None => {
                    let Some(module) = self.find_module_by_type(error.source_type_id) else {
                        continue;
                    };
                    let name = module.borrow().name().to_string();
                    ctx.clear_errors_from_source(error.source_type_id, None);
                    ctx.report_error_keyed(
                        error.source_type_id,
                        format!(
                            "CRITICAL: Module '{name}' reported error without proper \
                             attribution: {}",
                            error.message
                        ),
                        BAD_MODULE_KEY,
                    );
                }
            }
        }
    }
}

impl Drop for ModuleManager {
    fn drop(&mut self) {
        self.shutdown_all();
    }
}

/// Sentinel key marking normalized unattributed errors.
const BAD_MODULE_KEY: &str = "__bad_module__";

fn identity_of(module: &ModuleRc) -> (ModuleTypeId, String) {
    let module = module.borrow();
    (module.module_type_id(), module.name().to_string())
}

fn report_handler_failure(
    ctx: &FrameContext,
    type_id: ModuleTypeId,
    name: &str,
    error: &crate::errors::EmberError,
) {
    let message = format!("Module '{name}' handler failed: {error}");
    log::error!("{message}");
    ctx.report_error_keyed(type_id, message, name);
}

fn run_sync_handler(module: &ModuleRc, phase: PhaseId, ctx: &FrameContext) {
    let (type_id, name) = identity_of(module);
    let result = {
        let mut guard = module.borrow_mut();
        invoke_sync(&mut *guard, phase, ctx)
    };
    if let Err(error) = result {
        report_handler_failure(ctx, type_id, &name, &error);
    }
}

async fn run_barriered_handler(module: &ModuleRc, phase: PhaseId, ctx: &FrameContext) {
    let (type_id, name) = identity_of(module);
    let result = {
        let mut guard = module.borrow_mut();
        let future = invoke_barriered(&mut *guard, phase, ctx);
        future.await
    };
    if let Err(error) = result {
        report_handler_failure(ctx, type_id, &name, &error);
    }
}

fn shutdown_module(module: &ModuleRc) {
    let name = module.borrow().name().to_string();
    let outcome = catch_unwind(AssertUnwindSafe(|| module.borrow_mut().on_shutdown()));
    if outcome.is_err() {
        log::error!("Module '{name}' panicked during shutdown");
    }
}

fn invoke_subscriber(callback: &SubscriberCallback, event: &ModuleEvent, when: &str) {
    let outcome = catch_unwind(AssertUnwindSafe(|| callback(event)));
    if outcome.is_err() {
        log::error!("Subscriber callback panicked during {when}");
    }
}
