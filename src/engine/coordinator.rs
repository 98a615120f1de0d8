//! Frame coordinator
//!
//! [`Engine`] drives the frame loop: it advances the frame counter, walks the
//! 20 phases in their canonical order, prepares engine-internal state per
//! phase, dispatches modules through the module manager, publishes the
//! unified snapshot, and paces to the configured target frame rate against a
//! monotonic deadline.
//!
//! The coordinator is single-threaded. Barriered concurrency is cooperative
//! on this thread; CPU-heavy work leaves it only through the explicit thread
//! pool. Module errors never propagate out of a phase: they surface as error
//! reports in the frame context and are triaged by the module manager.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use xxhash_rust::xxh3::xxh3_64;

use crate::config::EngineConfig;
use crate::core::phase::PhaseId;
use crate::engine::context::{FrameContext, UnifiedSnapshot, engine_tag};
use crate::engine::module::{EngineModule, ModuleTypeId};
use crate::engine::module_manager::{ModuleManager, ModuleSubscription};
use crate::errors::{EmberError, Result};
use crate::graphics::{GraphicsBackend, SurfaceId};
use crate::input::InputSystem;
use crate::platform::{Platform, StopSource, ThreadPool};
use crate::utils::{FpsCounter, FrameTimer};

use std::sync::Arc;

/// Frames that may be in flight on the graphics backend.
pub const FRAMES_IN_FLIGHT: u32 = 3;

/// The engine facade and frame coordinator.
pub struct Engine {
    config: EngineConfig,
    platform: Box<dyn Platform>,
    graphics: Rc<RefCell<dyn GraphicsBackend>>,
    modules: ModuleManager,
    stop: StopSource,
    finished: bool,

    frame_number: u64,
    frame_slot: u32,
    frame_start_ts: Instant,
    snapshot_version: u64,
    surfaces: Vec<SurfaceId>,

    time_scale: f32,
    paused: bool,
    accumulated_fixed: Duration,
    timer: FrameTimer,
    fps: FpsCounter,
    next_deadline: Option<Instant>,
}

impl Engine {
    #[must_use]
    pub fn new(
        platform: Box<dyn Platform>,
        graphics: Rc<RefCell<dyn GraphicsBackend>>,
        config: EngineConfig,
    ) -> Self {
        Self {
            config,
            platform,
            graphics,
            modules: ModuleManager::new(config),
            stop: StopSource::new(),
            finished: false,
            frame_number: 0,
            frame_slot: 0,
            frame_start_ts: Instant::now(),
            snapshot_version: 0,
            surfaces: Vec::new(),
            time_scale: 1.0,
            paused: false,
            accumulated_fixed: Duration::ZERO,
            timer: FrameTimer::new(),
            fps: FpsCounter::new(),
            next_deadline: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registers a module; returns false when its attach hook rejects.
    pub fn register_module<M: EngineModule + 'static>(&mut self, module: M) -> bool {
        self.modules.register(module)
    }

    /// Unregisters a module by name.
    pub fn unregister_module(&mut self, name: &str) {
        self.modules.unregister(name);
    }

    /// Designates the module type the PreRender ordering rule treats as the
    /// renderer.
    pub fn designate_renderer(&mut self, type_id: ModuleTypeId) {
        self.modules.designate_renderer(type_id);
    }

    /// Subscribes to module-attached notifications.
    #[must_use]
    pub fn subscribe_module_attached(
        &mut self,
        callback: impl Fn(&crate::engine::module_manager::ModuleEvent) + 'static,
        replay_existing: bool,
    ) -> ModuleSubscription {
        self.modules.subscribe_module_attached(callback, replay_existing)
    }

    /// Registers a surface the frame context exposes each frame.
    pub fn register_surface(&mut self, surface: SurfaceId) {
        self.surfaces.push(surface);
    }

    /// Stop source; tokens minted from it stop the loop at the next frame
    /// boundary.
    #[must_use]
    pub fn stop_source(&self) -> StopSource {
        self.stop.clone()
    }

    /// Requests the frame loop to stop.
    pub fn stop(&self) {
        self.stop.request_stop();
    }

    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Frames completed so far.
    #[must_use]
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Version of the most recently published snapshot.
    #[must_use]
    pub fn snapshot_version(&self) -> u64 {
        self.snapshot_version
    }

    /// Runs the frame loop on a fresh current-thread runtime until a stop
    /// signal, platform termination, or the configured frame count.
    pub fn run(&mut self) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(EmberError::Io)?;
        runtime.block_on(self.run_async())
    }

    /// Async form of [`run`](Self::run) for hosts that already own a
    /// runtime.
    pub async fn run_async(&mut self) -> Result<()> {
        if self.finished {
            return Err(EmberError::EngineFinished);
        }
        log::info!(
            "Starting frame loop for {} frames (target_fps={})",
            self.config.frame_count,
            self.config.target_fps
        );

        self.frame_number = 0;
        self.next_deadline = None;
        self.timer = FrameTimer::new();
        let stop_token = self.stop.token();

        loop {
            if stop_token.stop_requested() {
                log::info!("Shutdown requested, stopping frame loop...");
                break;
            }
            if self.platform.close_requested() {
                log::info!("Termination requested, stopping frame loop...");
                break;
            }
            if !self.next_frame() {
                break;
            }

            self.frame().await;

            // Yield before pacing so residual work does not skew the next
            // frame start timestamp.
            tokio::task::yield_now().await;
            self.pace().await;
        }

        log::info!("Engine completed after {} frames", self.frame_number);
        self.shutdown();
        self.finished = true;
        Ok(())
    }

    fn next_frame(&mut self) -> bool {
        self.frame_number += 1;
        self.frame_slot = ((self.frame_number - 1) % u64::from(FRAMES_IN_FLIGHT)) as u32;
        if self.config.frame_count > 0 && self.frame_number > self.config.frame_count {
            self.frame_number -= 1;
            return false;
        }
        true
    }

    async fn frame(&mut self) {
        let ctx = FrameContext::new(self.frame_number, self.frame_slot, self.snapshot_version);

        self.phase_frame_start(&ctx).await;
        self.phase_input(&ctx).await;
        self.phase_network_reconciliation(&ctx);
        self.phase_random_seed(&ctx);
        self.phase_fixed_simulation(&ctx).await;
        self.phase_barriered(&ctx, PhaseId::Gameplay).await;
        self.phase_barriered(&ctx, PhaseId::SceneMutation).await;
        self.phase_barriered(&ctx, PhaseId::TransformPropagation).await;

        let snapshot = self.phase_snapshot(&ctx).await;
        self.phase_parallel_tasks(&ctx, &snapshot).await;

        self.phase_barriered(&ctx, PhaseId::PostParallel).await;
        self.phase_barriered(&ctx, PhaseId::GuiUpdate).await;
        self.phase_barriered(&ctx, PhaseId::PreRender).await;
        self.phase_barriered(&ctx, PhaseId::Render).await;
        self.phase_barriered(&ctx, PhaseId::Compositing).await;
        self.phase_present(&ctx);
        self.phase_barriered(&ctx, PhaseId::AsyncPoll).await;
        self.phase_budget_adapt(&ctx);
        self.phase_frame_end(&ctx).await;
    }

    async fn phase_frame_start(&mut self, ctx: &FrameContext) {
        let tag = engine_tag();
        ctx.set_current_phase(PhaseId::FrameStart, tag);

        self.frame_start_ts = Instant::now();
        ctx.set_frame_start_time(self.frame_start_ts, tag);
        ctx.clear_views(tag);
        ctx.set_surfaces(self.surfaces.clone(), tag);
        ctx.set_thread_pool(ThreadPool::current(), tag);

        self.update_frame_timing(ctx);

        self.graphics.borrow_mut().begin_frame(self.frame_number, self.frame_slot);
        self.modules.execute_phase(PhaseId::FrameStart, ctx).await;

        log::trace!("[F{}] frame start (slot {})", self.frame_number, self.frame_slot);
    }

    async fn phase_input(&mut self, ctx: &FrameContext) {
        let tag = engine_tag();
        ctx.set_current_phase(PhaseId::Input, tag);

        // Forward pending platform events into the input system before its
        // handler runs.
        let events = self.platform.pump_events();
        let input_module = self.modules.find_module_by_type(ModuleTypeId::of::<InputSystem>());
        if let Some(module) = &input_module {
            let mut guard = module.borrow_mut();
            if let Some(input) =
                guard.as_any_mut().and_then(|any| any.downcast_mut::<InputSystem>())
            {
                for event in events {
                    input.inject_event(event);
                }
            }
        }

        self.modules.execute_phase(PhaseId::Input, ctx).await;

        // Publish the stabilized input snapshot so downstream phases read a
        // consistent view. Re-resolve the module: triage may have removed it.
        if let Some(module) = self.modules.find_module_by_type(ModuleTypeId::of::<InputSystem>()) {
            let mut guard = module.borrow_mut();
            if let Some(input) =
                guard.as_any_mut().and_then(|any| any.downcast_mut::<InputSystem>())
            {
                if let Some(snapshot) = input.current_snapshot() {
                    ctx.set_input_snapshot(snapshot, tag);
                }
            }
        }
    }

    fn phase_network_reconciliation(&mut self, ctx: &FrameContext) {
        // Engine-side packet application and reconciliation; no module
        // handler participates in this phase.
        ctx.set_current_phase(PhaseId::NetworkReconciliation, engine_tag());
    }

    /// Derives the deterministic per-frame seed before any consumer of
    /// randomness runs.
    fn phase_random_seed(&mut self, ctx: &FrameContext) {
        let tag = engine_tag();
        ctx.set_current_phase(PhaseId::RandomSeedManagement, tag);
        let seed = xxh3_64(&self.frame_number.to_le_bytes());
        ctx.set_frame_seed(seed, tag);
    }

    async fn phase_fixed_simulation(&mut self, ctx: &FrameContext) {
        let tag = engine_tag();
        ctx.set_current_phase(PhaseId::FixedSimulation, tag);

        let timing_config = self.config.timing;
        let fixed_delta = timing_config.fixed_delta;
        if fixed_delta.is_zero() {
            let mut timing = ctx.timing();
            timing.fixed_steps_this_frame = 0;
            timing.interpolation_alpha = 0.0;
            ctx.set_timing(timing, tag);
            return;
        }

        // Clamp the accumulator so a long frame cannot trigger unbounded
        // catch-up.
        self.accumulated_fixed = self.accumulated_fixed.min(timing_config.max_accumulator);

        let mut steps: u32 = 0;
        while self.accumulated_fixed >= fixed_delta && steps < timing_config.max_substeps {
            let mut timing = ctx.timing();
            timing.fixed_delta = fixed_delta;
            timing.fixed_steps_this_frame = steps + 1;
            ctx.set_timing(timing, tag);

            log::trace!(
                "[F{}] fixed substep {} (accumulated: {:?})",
                self.frame_number,
                steps + 1,
                self.accumulated_fixed
            );
            self.modules.execute_phase(PhaseId::FixedSimulation, ctx).await;

            self.accumulated_fixed -= fixed_delta;
            steps += 1;
        }

        if steps == 0 {
            // No substep was due; still dispatch once so modules observe the
            // phase every frame.
            self.modules.execute_phase(PhaseId::FixedSimulation, ctx).await;
        }

        let mut timing = ctx.timing();
        timing.fixed_steps_this_frame = steps;
        timing.interpolation_alpha = (self.accumulated_fixed.as_secs_f32()
            / fixed_delta.as_secs_f32())
        .clamp(0.0, 1.0);
        ctx.set_timing(timing, tag);
    }

    async fn phase_barriered(&mut self, ctx: &FrameContext, phase: PhaseId) {
        ctx.set_current_phase(phase, engine_tag());
        self.modules.execute_phase(phase, ctx).await;
    }

    async fn phase_snapshot(&mut self, ctx: &FrameContext) -> Arc<UnifiedSnapshot> {
        let tag = engine_tag();
        ctx.set_current_phase(PhaseId::Snapshot, tag);

        self.modules.execute_phase(PhaseId::Snapshot, ctx).await;

        // Engine consolidates contributions and publishes last.
        let snapshot = ctx.publish_snapshots(tag);
        self.snapshot_version = snapshot.version();
        log::trace!("[F{}] published snapshots v{}", self.frame_number, snapshot.version());
        snapshot
    }

    async fn phase_parallel_tasks(&mut self, ctx: &FrameContext, snapshot: &Arc<UnifiedSnapshot>) {
        ctx.set_current_phase(PhaseId::ParallelTasks, engine_tag());
        self.modules.execute_parallel_tasks(ctx, snapshot).await;
    }

    fn phase_present(&mut self, ctx: &FrameContext) {
        ctx.set_current_phase(PhaseId::Present, engine_tag());
        let presentable = ctx.presentable_surfaces();
        if !presentable.is_empty() {
            self.graphics.borrow_mut().present_surfaces(&presentable);
        }
        log::trace!("[F{}] present: {} surfaces", self.frame_number, presentable.len());
    }

    fn phase_budget_adapt(&mut self, ctx: &FrameContext) {
        // Scheduling heuristics hook; currently only phase bookkeeping.
        ctx.set_current_phase(PhaseId::BudgetAdapt, engine_tag());
    }

    async fn phase_frame_end(&mut self, ctx: &FrameContext) {
        ctx.set_current_phase(PhaseId::FrameEnd, engine_tag());
        self.modules.execute_phase(PhaseId::FrameEnd, ctx).await;

        self.graphics.borrow_mut().end_frame(self.frame_number, self.frame_slot);

        let total = self.frame_start_ts.elapsed();
        log::trace!("[F{}] frame end | total={total:?}", self.frame_number);
        if let Some(fps) = self.fps.frame() {
            log::debug!("[F{}] health: {fps:.1} fps", self.frame_number);
        }
    }

    /// Builds this frame's module timing from the clamped, scaled wall-clock
    /// delta and feeds the fixed-step accumulator.
    fn update_frame_timing(&mut self, ctx: &FrameContext) {
        let clamped = self.timer.tick();

        let mut timing = ctx.timing();
        timing.time_scale = self.time_scale;
        timing.is_paused = self.paused;
        if self.paused {
            timing.game_delta = Duration::ZERO;
        } else {
            let scaled = Duration::from_secs_f64(clamped.as_secs_f64() * f64::from(self.time_scale));
            timing.game_delta = scaled;
            self.accumulated_fixed += scaled;
        }

        let fixed_delta = self.config.timing.fixed_delta;
        timing.fixed_delta = fixed_delta;
        if !fixed_delta.is_zero() {
            timing.interpolation_alpha = (self.accumulated_fixed.as_secs_f32()
                / fixed_delta.as_secs_f32())
            .clamp(0.0, 1.0);
        }
        timing.current_fps =
            if clamped.is_zero() { 0.0 } else { 1.0 / clamped.as_secs_f32() };
        ctx.set_timing(timing, engine_tag());

        log::trace!(
            "[F{}] timing: delta={clamped:?} smoothed={:?} accumulated={:?} fps={:.1}",
            self.frame_number,
            self.timer.smoothed_delta(),
            self.accumulated_fixed,
            timing.current_fps
        );
    }

    /// Deadline-based pacing: advance the deadline by one period per frame,
    /// resynchronize when more than a period behind, sleep until just before
    /// the deadline, then cooperatively yield-poll across the remainder.
    async fn pace(&mut self) {
        if self.config.target_fps == 0 {
            return;
        }
        let period = Duration::from_nanos(1_000_000_000 / u64::from(self.config.target_fps));

        let mut deadline = match self.next_deadline {
            None => self.frame_start_ts + period,
            Some(previous) => previous + period,
        };
        let now = Instant::now();
        if now > deadline + period {
            // Fell behind by more than a period: resynchronize instead of
            // accumulating lag.
            deadline = now + period;
        }
        self.next_deadline = Some(deadline);

        if deadline > now {
            let sleep_until = deadline - self.config.timing.pacing_safety_margin;
            if sleep_until > now {
                tokio::time::sleep_until(tokio::time::Instant::from_std(sleep_until)).await;
            }
            while Instant::now() < deadline {
                tokio::task::yield_now().await;
            }
        }

        let slip = Instant::now().saturating_duration_since(deadline);
        log::trace!("[F{}] pacing: period={period:?} slip={slip:?}", self.frame_number);
    }

    /// Shutdown sequence: flush the graphics backend, signal the platform,
    /// then tear modules down in reverse registration order.
    fn shutdown(&mut self) {
        self.graphics.borrow_mut().flush();
        self.platform.shutdown();
        self.modules.shutdown_all();
        log::debug!("Engine shutdown complete");
    }
}
