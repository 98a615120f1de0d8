//! Frame context
//!
//! The per-frame hub shared by the coordinator and module handlers. Mutation
//! is gated two ways: coordinator-only methods take the [`EngineTag`]
//! capability token (constructible only inside the engine), and module-facing
//! mutators check the current phase's registry permissions. Permission
//! violations are fatal in debug builds and logged-and-ignored in release.
//!
//! The context lives on the coordinator thread; parallel tasks never see it,
//! they receive the published [`UnifiedSnapshot`] instead.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::phase::{AllowMutation, PhaseId, phase_desc};
use crate::engine::module::ModuleTypeId;
use crate::graphics::{RenderView, SurfaceId};
use crate::platform::ThreadPool;

/// Capability token gating coordinator-only mutation of the frame context.
/// Only the engine core can construct one.
#[derive(Debug, Clone, Copy)]
pub struct EngineTag {
    _private: (),
}

/// Mints a capability token. Crate-internal: the coordinator (and tests
/// inside this crate) mint tags, application code cannot.
#[inline]
#[must_use]
pub(crate) fn engine_tag() -> EngineTag {
    EngineTag { _private: () }
}

/// Per-frame timing published to modules.
#[derive(Debug, Clone, Copy)]
pub struct ModuleTiming {
    /// Scaled delta since the previous frame (zero while paused).
    pub game_delta: Duration,
    /// Multiplier applied to wall-clock delta.
    pub time_scale: f32,
    pub is_paused: bool,
    /// Fixed-step period in effect this frame.
    pub fixed_delta: Duration,
    /// Fixed substeps executed this frame.
    pub fixed_steps_this_frame: u32,
    /// Fixed-step interpolation alpha in `[0, 1]`.
    pub interpolation_alpha: f32,
    /// Instantaneous frames per second.
    pub current_fps: f32,
}

impl Default for ModuleTiming {
    fn default() -> Self {
        Self {
            game_delta: Duration::ZERO,
            time_scale: 1.0,
            is_paused: false,
            fixed_delta: Duration::ZERO,
            fixed_steps_this_frame: 0,
            interpolation_alpha: 0.0,
            current_fps: 0.0,
        }
    }
}

/// Typed error report surfaced by module handlers.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source_type_id: ModuleTypeId,
    pub message: String,
    /// Module name when the reporter attributed itself properly.
    pub source_key: Option<String>,
    /// Phase during which the error was reported.
    pub phase: PhaseId,
}

/// Validation metadata carried by the published frame snapshot.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotValidation {
    pub snapshot_version: u64,
    pub frame_sequence: u64,
    pub frame_slot: u32,
}

/// Immutable per-frame view over the frame's outputs.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub validation: SnapshotValidation,
    pub timing: ModuleTiming,
    pub views: Vec<RenderView>,
}

/// The published, immutable per-frame view consumed by parallel tasks.
pub struct UnifiedSnapshot {
    /// Opaque input sub-snapshot published at the Input phase.
    pub input: Option<Arc<dyn Any + Send + Sync>>,
    pub frame: FrameSnapshot,
}

impl UnifiedSnapshot {
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.frame.validation.snapshot_version
    }
}

/// Phase-gated shared state for one frame.
pub struct FrameContext {
    current_phase: Cell<PhaseId>,
    sequence: u64,
    slot: u32,
    frame_start: Cell<Instant>,
    frame_seed: Cell<u64>,
    timing: Cell<ModuleTiming>,
    thread_pool: RefCell<Option<ThreadPool>>,

    input_snapshot: RefCell<Option<Arc<dyn Any + Send + Sync>>>,
    views: RefCell<Vec<RenderView>>,
    surfaces: RefCell<Vec<SurfaceId>>,
    presentable: RefCell<Vec<bool>>,
    errors: RefCell<Vec<ErrorReport>>,

    base_snapshot_version: u64,
    published: RefCell<Option<Arc<UnifiedSnapshot>>>,
}

impl FrameContext {
    /// Builds the context for one frame. `base_snapshot_version` is the
    /// version published last frame; this frame publishes strictly greater.
    #[must_use]
    pub(crate) fn new(sequence: u64, slot: u32, base_snapshot_version: u64) -> Self {
        Self {
            current_phase: Cell::new(PhaseId::FrameStart),
            sequence,
            slot,
            frame_start: Cell::new(Instant::now()),
            frame_seed: Cell::new(0),
            timing: Cell::new(ModuleTiming::default()),
            thread_pool: RefCell::new(None),
            input_snapshot: RefCell::new(None),
            views: RefCell::new(Vec::new()),
            surfaces: RefCell::new(Vec::new()),
            presentable: RefCell::new(Vec::new()),
            errors: RefCell::new(Vec::new()),
            base_snapshot_version,
            published: RefCell::new(None),
        }
    }

    fn violation(&self, what: &str) {
        let phase = self.current_phase.get();
        log::error!("FrameContext: {what} during {} violates phase permissions", phase.name());
        debug_assert!(false, "{what} during {} violates phase permissions", phase.name());
    }

    fn check_permission(&self, required: AllowMutation, what: &str) -> bool {
        let allowed = phase_desc(self.current_phase.get()).allowed_mutations;
        if allowed.contains(required) {
            true
        } else {
            self.violation(what);
            false
        }
    }

    // ========================================================================
    // Read API (unrestricted)
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn current_phase(&self) -> PhaseId {
        self.current_phase.get()
    }

    #[inline]
    #[must_use]
    pub fn sequence_number(&self) -> u64 {
        self.sequence
    }

    /// Frame slot: sequence modulo frames-in-flight.
    #[inline]
    #[must_use]
    pub fn slot(&self) -> u32 {
        self.slot
    }

    #[inline]
    #[must_use]
    pub fn frame_start_time(&self) -> Instant {
        self.frame_start.get()
    }

    /// Deterministic per-frame seed, derived before any consumer of
    /// randomness runs.
    #[inline]
    #[must_use]
    pub fn frame_seed(&self) -> u64 {
        self.frame_seed.get()
    }

    #[inline]
    #[must_use]
    pub fn timing(&self) -> ModuleTiming {
        self.timing.get()
    }

    /// Thread pool for phases whose registry entry allows worker offload.
    #[must_use]
    pub fn thread_pool(&self) -> Option<ThreadPool> {
        self.thread_pool.borrow().clone()
    }

    /// The opaque input snapshot, once published at the Input phase.
    #[must_use]
    pub fn input_snapshot(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.input_snapshot.borrow().clone()
    }

    #[must_use]
    pub fn views(&self) -> Vec<RenderView> {
        self.views.borrow().clone()
    }

    #[must_use]
    pub fn surfaces(&self) -> Vec<SurfaceId> {
        self.surfaces.borrow().clone()
    }

    /// Surfaces whose presentable flag was set this frame.
    #[must_use]
    pub fn presentable_surfaces(&self) -> Vec<SurfaceId> {
        let surfaces = self.surfaces.borrow();
        let presentable = self.presentable.borrow();
        surfaces
            .iter()
            .zip(presentable.iter())
            .filter_map(|(surface, flag)| flag.then_some(*surface))
            .collect()
    }

    #[must_use]
    pub fn errors(&self) -> Vec<ErrorReport> {
        self.errors.borrow().clone()
    }

    /// The snapshot published this frame, if the Snapshot phase ran already.
    #[must_use]
    pub fn published_snapshot(&self) -> Option<Arc<UnifiedSnapshot>> {
        self.published.borrow().clone()
    }

    // ========================================================================
    // Coordinator API (EngineTag-gated)
    // ========================================================================

    pub(crate) fn set_current_phase(&self, phase: PhaseId, _tag: EngineTag) {
        self.current_phase.set(phase);
    }

    pub(crate) fn set_frame_start_time(&self, at: Instant, _tag: EngineTag) {
        self.frame_start.set(at);
    }

    pub(crate) fn set_frame_seed(&self, seed: u64, _tag: EngineTag) {
        self.frame_seed.set(seed);
    }

    pub(crate) fn set_timing(&self, timing: ModuleTiming, _tag: EngineTag) {
        self.timing.set(timing);
    }

    pub(crate) fn set_thread_pool(&self, pool: ThreadPool, _tag: EngineTag) {
        *self.thread_pool.borrow_mut() = Some(pool);
    }

    /// Seeds the frame's surface list; presentable flags reset to false.
    pub(crate) fn set_surfaces(&self, surfaces: Vec<SurfaceId>, _tag: EngineTag) {
        let count = surfaces.len();
        *self.surfaces.borrow_mut() = surfaces;
        *self.presentable.borrow_mut() = vec![false; count];
    }

    pub(crate) fn clear_views(&self, _tag: EngineTag) {
        self.views.borrow_mut().clear();
    }

    pub(crate) fn clear_presentable_flags(&self, _tag: EngineTag) {
        self.presentable.borrow_mut().fill(false);
    }

    /// Publishes the input snapshot. The contract requires the current phase
    /// to be Input.
    pub(crate) fn set_input_snapshot(&self, snapshot: Arc<dyn Any + Send + Sync>, _tag: EngineTag) {
        if self.current_phase.get() != PhaseId::Input {
            self.violation("SetInputSnapshot");
            return;
        }
        *self.input_snapshot.borrow_mut() = Some(snapshot);
    }

    /// Consolidates frame contributions and publishes the immutable snapshot.
    /// Publishing twice in one frame is an invariant violation; the first
    /// snapshot is kept.
    pub(crate) fn publish_snapshots(&self, _tag: EngineTag) -> Arc<UnifiedSnapshot> {
        if let Some(existing) = self.published.borrow().as_ref() {
            self.violation("PublishSnapshots called twice");
            return Arc::clone(existing);
        }
        let snapshot = Arc::new(UnifiedSnapshot {
            input: self.input_snapshot.borrow().clone(),
            frame: FrameSnapshot {
                validation: SnapshotValidation {
                    snapshot_version: self.base_snapshot_version + 1,
                    frame_sequence: self.sequence,
                    frame_slot: self.slot,
                },
                timing: self.timing.get(),
                views: self.views.borrow().clone(),
            },
        });
        *self.published.borrow_mut() = Some(Arc::clone(&snapshot));
        snapshot
    }

    // ========================================================================
    // Module API (phase-permission checked)
    // ========================================================================

    /// Adds a per-view entry. Requires FrameState mutation permission.
    pub fn add_view(&self, view: RenderView) {
        if self.check_permission(AllowMutation::FRAME_STATE, "AddView") {
            self.views.borrow_mut().push(view);
        }
    }

    /// Marks `surface` ready for presentation. Requires FrameState mutation
    /// permission. Unknown surfaces are ignored with a diagnostic.
    pub fn set_surface_presentable(&self, surface: SurfaceId, presentable: bool) {
        if !self.check_permission(AllowMutation::FRAME_STATE, "SetSurfacePresentable") {
            return;
        }
        let surfaces = self.surfaces.borrow();
        match surfaces.iter().position(|s| *s == surface) {
            Some(index) => self.presentable.borrow_mut()[index] = presentable,
            None => log::warn!("SetSurfacePresentable: unknown surface {surface:?}"),
        }
    }

    /// Appends a typed error report without source attribution.
    pub fn report_error(&self, source_type_id: ModuleTypeId, message: impl Into<String>) {
        self.errors.borrow_mut().push(ErrorReport {
            source_type_id,
            message: message.into(),
            source_key: None,
            phase: self.current_phase.get(),
        });
    }

    /// Appends a typed error report attributed to a named source.
    pub fn report_error_keyed(
        &self,
        source_type_id: ModuleTypeId,
        message: impl Into<String>,
        source_key: impl Into<String>,
    ) {
        self.errors.borrow_mut().push(ErrorReport {
            source_type_id,
            message: message.into(),
            source_key: Some(source_key.into()),
            phase: self.current_phase.get(),
        });
    }

    /// Clears reports from `source_type_id`; when `source_key` is given, only
    /// reports carrying that exact key are cleared.
    pub fn clear_errors_from_source(&self, source_type_id: ModuleTypeId, source_key: Option<&str>) {
        self.errors.borrow_mut().retain(|report| {
            if report.source_type_id != source_type_id {
                return true;
            }
            match source_key {
                Some(key) => report.source_key.as_deref() != Some(key),
                None => false,
            }
        });
    }
}
