//! Frame-loop integration tests: canonical phase ordering, permission-gated
//! mutation, failure triage, snapshot versioning, fixed-step behavior, and
//! pacing.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ember::engine::{EngineModule, ModuleFuture, ModuleTypeId, ready_ok};
use ember::graphics::{NullGraphics, RenderView};
use ember::platform::HeadlessPlatform;
use ember::{
    Engine, EngineConfig, FrameContext, PhaseId, PhaseMask, SurfaceId, TimingConfig,
    UnifiedSnapshot,
};

#[derive(Default)]
struct ProbeLog {
    phases: Vec<PhaseId>,
    snapshot_versions: Vec<u64>,
    fixed_calls_per_frame: Vec<(u64, u32)>,
    errors_at_frame_end: Vec<usize>,
}

/// Records every phase it sees and exercises permitted mutations.
struct ProbeModule {
    log: Rc<RefCell<ProbeLog>>,
    sleep_at_frame_end: Option<(u64, Duration)>,
}

impl ProbeModule {
    fn new(log: &Rc<RefCell<ProbeLog>>) -> Self {
        Self { log: Rc::clone(log), sleep_at_frame_end: None }
    }

    fn record(&self, phase: PhaseId) {
        self.log.borrow_mut().phases.push(phase);
    }

    fn recorded<'a>(&'a self, ctx: &'a FrameContext) -> ModuleFuture<'a> {
        self.record(ctx.current_phase());
        ready_ok()
    }
}

impl EngineModule for ProbeModule {
    fn module_type_id(&self) -> ModuleTypeId {
        ModuleTypeId::of::<ProbeModule>()
    }

    fn name(&self) -> &str {
        "Probe"
    }

    fn supported_phases(&self) -> PhaseMask {
        PhaseMask::all()
    }

    fn on_frame_start(&mut self, ctx: &FrameContext) -> ember::Result<()> {
        self.record(ctx.current_phase());
        Ok(())
    }

    fn on_input<'a>(&'a mut self, ctx: &'a FrameContext) -> ModuleFuture<'a> {
        self.recorded(ctx)
    }

    fn on_fixed_simulation<'a>(&'a mut self, ctx: &'a FrameContext) -> ModuleFuture<'a> {
        let frame = ctx.sequence_number();
        let mut log = self.log.borrow_mut();
        match log.fixed_calls_per_frame.last_mut() {
            Some((recorded_frame, count)) if *recorded_frame == frame => *count += 1,
            _ => log.fixed_calls_per_frame.push((frame, 1)),
        }
        drop(log);
        self.recorded(ctx)
    }

    fn on_gameplay<'a>(&'a mut self, ctx: &'a FrameContext) -> ModuleFuture<'a> {
        self.recorded(ctx)
    }

    fn on_scene_mutation<'a>(&'a mut self, ctx: &'a FrameContext) -> ModuleFuture<'a> {
        self.recorded(ctx)
    }

    fn on_transform_propagation<'a>(&'a mut self, ctx: &'a FrameContext) -> ModuleFuture<'a> {
        self.recorded(ctx)
    }

    fn on_snapshot(&mut self, ctx: &FrameContext) -> ember::Result<()> {
        self.record(ctx.current_phase());
        Ok(())
    }

    fn on_parallel_tasks(&mut self, snapshot: Arc<UnifiedSnapshot>) -> ModuleFuture<'_> {
        let mut log = self.log.borrow_mut();
        log.phases.push(PhaseId::ParallelTasks);
        log.snapshot_versions.push(snapshot.version());
        ready_ok()
    }

    fn on_post_parallel<'a>(&'a mut self, ctx: &'a FrameContext) -> ModuleFuture<'a> {
        self.recorded(ctx)
    }

    fn on_gui_update<'a>(&'a mut self, ctx: &'a FrameContext) -> ModuleFuture<'a> {
        self.recorded(ctx)
    }

    fn on_pre_render<'a>(&'a mut self, ctx: &'a FrameContext) -> ModuleFuture<'a> {
        // FrameState mutation is permitted here per the phase registry.
        ctx.add_view(RenderView { label: "probe".into(), surface: Some(SurfaceId(0)) });
        self.recorded(ctx)
    }

    fn on_render<'a>(&'a mut self, ctx: &'a FrameContext) -> ModuleFuture<'a> {
        ctx.set_surface_presentable(SurfaceId(0), true);
        self.recorded(ctx)
    }

    fn on_compositing<'a>(&'a mut self, ctx: &'a FrameContext) -> ModuleFuture<'a> {
        self.recorded(ctx)
    }

    fn on_async_poll<'a>(&'a mut self, ctx: &'a FrameContext) -> ModuleFuture<'a> {
        self.recorded(ctx)
    }

    fn on_frame_end(&mut self, ctx: &FrameContext) -> ember::Result<()> {
        self.record(ctx.current_phase());
        self.log.borrow_mut().errors_at_frame_end.push(ctx.errors().len());
        if let Some((frame, pause)) = self.sleep_at_frame_end {
            if ctx.sequence_number() == frame {
                std::thread::sleep(pause);
            }
        }
        Ok(())
    }
}

fn engine_with(config: EngineConfig) -> (Engine, Rc<RefCell<NullGraphics>>) {
    let graphics = Rc::new(RefCell::new(NullGraphics::new()));
    let engine = Engine::new(Box::new(HeadlessPlatform::new()), graphics.clone(), config);
    (engine, graphics)
}

#[test]
fn phases_run_in_canonical_order_and_mutations_succeed() {
    let config = EngineConfig { frame_count: 2, ..EngineConfig::default() };
    let (mut engine, graphics) = engine_with(config);
    engine.register_surface(SurfaceId(0));
    engine.designate_renderer(ModuleTypeId::of::<ProbeModule>());

    let log = Rc::new(RefCell::new(ProbeLog::default()));
    assert!(engine.register_module(ProbeModule::new(&log)));

    engine.run().unwrap();

    let log = log.borrow();
    // No module errors surfaced in any frame.
    assert!(log.errors_at_frame_end.iter().all(|count| *count == 0));

    // Within each frame the observed phase ids follow the canonical order.
    let mut frames: Vec<Vec<PhaseId>> = Vec::new();
    for phase in &log.phases {
        if *phase == PhaseId::FrameStart {
            frames.push(Vec::new());
        }
        frames.last_mut().unwrap().push(*phase);
    }
    assert_eq!(frames.len(), 2);
    for frame in &frames {
        assert!(frame.windows(2).all(|pair| pair[0] <= pair[1]), "phase order violated: {frame:?}");
        assert_eq!(*frame.first().unwrap(), PhaseId::FrameStart);
        assert_eq!(*frame.last().unwrap(), PhaseId::FrameEnd);
        assert!(frame.contains(&PhaseId::Snapshot));
        assert!(frame.contains(&PhaseId::ParallelTasks));
    }

    // The render module marked the surface presentable; Present consumed it.
    let graphics = graphics.borrow();
    assert_eq!(graphics.presented, vec![SurfaceId(0), SurfaceId(0)]);
    assert_eq!(graphics.frames_begun, 2);
    assert_eq!(graphics.frames_ended, 2);
    assert_eq!(graphics.flush_count, 1);
}

#[test]
fn snapshot_versions_strictly_increase() {
    let config = EngineConfig { frame_count: 3, ..EngineConfig::default() };
    let (mut engine, _graphics) = engine_with(config);
    let log = Rc::new(RefCell::new(ProbeLog::default()));
    engine.register_module(ProbeModule::new(&log));

    engine.run().unwrap();

    let versions = &log.borrow().snapshot_versions;
    assert_eq!(versions.len(), 3);
    assert!(versions.windows(2).all(|pair| pair[1] > pair[0]), "versions: {versions:?}");
    assert_eq!(engine.snapshot_version(), versions[2]);
}

struct FailingModule {
    name: &'static str,
    critical: bool,
    calls: Rc<RefCell<u32>>,
}

impl EngineModule for FailingModule {
    fn module_type_id(&self) -> ModuleTypeId {
        ModuleTypeId::of::<FailingModule>()
    }

    fn name(&self) -> &str {
        self.name
    }

    fn is_critical(&self) -> bool {
        self.critical
    }

    fn supported_phases(&self) -> PhaseMask {
        PhaseMask::GAMEPLAY
    }

    fn on_gameplay<'a>(&'a mut self, _ctx: &'a FrameContext) -> ModuleFuture<'a> {
        *self.calls.borrow_mut() += 1;
        let name = self.name.to_string();
        Box::pin(std::future::ready(Err(ember::EmberError::ModuleFailure {
            name,
            message: "scripted failure".into(),
        })))
    }
}

#[test]
fn non_critical_failure_removes_module_critical_stays() {
    let config = EngineConfig { frame_count: 3, ..EngineConfig::default() };
    let (mut engine, _graphics) = engine_with(config);

    let fragile_calls = Rc::new(RefCell::new(0));
    let critical_calls = Rc::new(RefCell::new(0));
    engine.register_module(FailingModule {
        name: "Fragile",
        critical: false,
        calls: Rc::clone(&fragile_calls),
    });
    engine.register_module(FailingModule {
        name: "Load-bearing",
        critical: true,
        calls: Rc::clone(&critical_calls),
    });

    engine.run().unwrap();

    // The non-critical module was unregistered after its first failure; the
    // critical one kept running every frame.
    assert_eq!(*fragile_calls.borrow(), 1);
    assert_eq!(*critical_calls.borrow(), 3);
}

#[test]
fn oversized_delta_clamps_to_max_substeps() {
    let config = EngineConfig {
        frame_count: 2,
        timing: TimingConfig {
            fixed_delta: Duration::from_millis(1),
            max_accumulator: Duration::from_millis(5),
            max_substeps: 4,
            ..TimingConfig::default()
        },
        ..EngineConfig::default()
    };
    let (mut engine, _graphics) = engine_with(config);

    let log = Rc::new(RefCell::new(ProbeLog::default()));
    let mut probe = ProbeModule::new(&log);
    // Make frame 2's wall-clock delta far exceed max_accumulator.
    probe.sleep_at_frame_end = Some((1, Duration::from_millis(20)));
    engine.register_module(probe);

    engine.run().unwrap();

    let log = log.borrow();
    let frame2 = log
        .fixed_calls_per_frame
        .iter()
        .find(|(frame, _)| *frame == 2)
        .map(|(_, count)| *count)
        .unwrap();
    assert_eq!(frame2, 4, "oversized delta must dispatch exactly max_substeps substeps");
}

#[test]
fn stop_signal_ends_unbounded_run() {
    let config = EngineConfig { frame_count: 0, target_fps: 500, ..EngineConfig::default() };
    let (mut engine, _graphics) = engine_with(config);
    let log = Rc::new(RefCell::new(ProbeLog::default()));
    engine.register_module(ProbeModule::new(&log));

    let stop = engine.stop_source();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        stop.request_stop();
    });

    engine.run().unwrap();
    stopper.join().unwrap();

    assert!(engine.frame_number() > 0);
    // A finished engine refuses to run again.
    assert!(engine.run().is_err());
}

#[test]
fn pacing_holds_frames_near_target_period() {
    let config = EngineConfig { frame_count: 10, target_fps: 200, ..EngineConfig::default() };
    let (mut engine, _graphics) = engine_with(config);

    let started = Instant::now();
    engine.run().unwrap();
    let elapsed = started.elapsed();

    // 10 frames at 5 ms period: at least ~9 paced gaps must have elapsed.
    assert!(elapsed >= Duration::from_millis(40), "paced run finished too fast: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "paced run took too long: {elapsed:?}");
}
