//! Phase and barrier registry
//!
//! The canonical, ordered description of every frame phase: its execution
//! model, the state layers it may mutate, and whether module handlers may use
//! worker threads during it. The registry is a `const` table; the numeric
//! values of [`PhaseId`] are stable and identify a phase's slot in the frame.
//!
//! Barriers are synchronization markers pinned to the phase after which they
//! occur; downstream phases observe all effects established by the barrier's
//! phase.

use bitflags::bitflags;

/// Ordered frame phases. Numeric values are stable public ABI and must match
/// the frame loop ordering.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PhaseId {
    FrameStart = 0,
    Input = 1,
    NetworkReconciliation = 2,
    RandomSeedManagement = 3,
    FixedSimulation = 4,
    Gameplay = 5,
    SceneMutation = 6,
    TransformPropagation = 7,
    Snapshot = 8,
    ParallelTasks = 9,
    PostParallel = 10,
    GuiUpdate = 11,
    PreRender = 12,
    Render = 13,
    Compositing = 14,
    Present = 15,
    AsyncPoll = 16,
    BudgetAdapt = 17,
    FrameEnd = 18,
    DetachedServices = 19,
}

impl PhaseId {
    /// Number of phases in a frame. Never a valid phase id itself.
    pub const COUNT: usize = 20;

    /// All phases in canonical frame order.
    pub const ALL: [PhaseId; PhaseId::COUNT] = [
        PhaseId::FrameStart,
        PhaseId::Input,
        PhaseId::NetworkReconciliation,
        PhaseId::RandomSeedManagement,
        PhaseId::FixedSimulation,
        PhaseId::Gameplay,
        PhaseId::SceneMutation,
        PhaseId::TransformPropagation,
        PhaseId::Snapshot,
        PhaseId::ParallelTasks,
        PhaseId::PostParallel,
        PhaseId::GuiUpdate,
        PhaseId::PreRender,
        PhaseId::Render,
        PhaseId::Compositing,
        PhaseId::Present,
        PhaseId::AsyncPoll,
        PhaseId::BudgetAdapt,
        PhaseId::FrameEnd,
        PhaseId::DetachedServices,
    ];

    /// Index of this phase in the registry tables.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Single-phase mask for this phase.
    #[inline]
    #[must_use]
    pub const fn mask(self) -> PhaseMask {
        PhaseMask::from_bits_retain(1 << (self as u32))
    }

    /// Display name, for logging and diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            PhaseId::FrameStart => "FrameStart",
            PhaseId::Input => "Input",
            PhaseId::NetworkReconciliation => "NetworkReconciliation",
            PhaseId::RandomSeedManagement => "RandomSeedManagement",
            PhaseId::FixedSimulation => "FixedSimulation",
            PhaseId::Gameplay => "Gameplay",
            PhaseId::SceneMutation => "SceneMutation",
            PhaseId::TransformPropagation => "TransformPropagation",
            PhaseId::Snapshot => "Snapshot",
            PhaseId::ParallelTasks => "ParallelTasks",
            PhaseId::PostParallel => "PostParallel",
            PhaseId::GuiUpdate => "GuiUpdate",
            PhaseId::PreRender => "PreRender",
            PhaseId::Render => "Render",
            PhaseId::Compositing => "Compositing",
            PhaseId::Present => "Present",
            PhaseId::AsyncPoll => "AsyncPoll",
            PhaseId::BudgetAdapt => "BudgetAdapt",
            PhaseId::FrameEnd => "FrameEnd",
            PhaseId::DetachedServices => "DetachedServices",
        }
    }
}

bitflags! {
    /// Compact set of phases, used by modules to declare which phases they
    /// subscribe to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PhaseMask: u32 {
        const FRAME_START = 1 << 0;
        const INPUT = 1 << 1;
        const NETWORK_RECONCILIATION = 1 << 2;
        const RANDOM_SEED_MANAGEMENT = 1 << 3;
        const FIXED_SIMULATION = 1 << 4;
        const GAMEPLAY = 1 << 5;
        const SCENE_MUTATION = 1 << 6;
        const TRANSFORM_PROPAGATION = 1 << 7;
        const SNAPSHOT = 1 << 8;
        const PARALLEL_TASKS = 1 << 9;
        const POST_PARALLEL = 1 << 10;
        const GUI_UPDATE = 1 << 11;
        const PRE_RENDER = 1 << 12;
        const RENDER = 1 << 13;
        const COMPOSITING = 1 << 14;
        const PRESENT = 1 << 15;
        const ASYNC_POLL = 1 << 16;
        const BUDGET_ADAPT = 1 << 17;
        const FRAME_END = 1 << 18;
        const DETACHED_SERVICES = 1 << 19;
    }
}

impl PhaseMask {
    /// True when `phase` is a member of this mask.
    #[inline]
    #[must_use]
    pub const fn has(self, phase: PhaseId) -> bool {
        self.bits() & phase.mask().bits() != 0
    }
}

bitflags! {
    /// State layers a phase is permitted to mutate. `empty()` means the phase
    /// is read-only for modules.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AllowMutation: u32 {
        /// Authoritative, cross-frame game data.
        const GAME_STATE = 1 << 0;
        /// Transient per-frame outputs (views, presentable flags, draw data).
        const FRAME_STATE = 1 << 1;
        /// Coordinator-visible engine registries and metadata.
        const ENGINE_STATE = 1 << 2;
    }
}

/// Execution model of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionModel {
    /// Runs on the coordinator thread, modules in deterministic order.
    SynchronousOrdered,
    /// Cooperative parallel awaitables, joined before the next phase.
    BarrieredConcurrency,
    /// Fire-and-forget multi-frame pipelines polled later.
    DeferredPipelines,
    /// Fire-and-forget cross-cutting services outside the frame path.
    Detached,
    /// Small coordinator-internal steps not exposed to modules.
    EngineInternal,
}

/// Per-phase descriptor stored in [`PHASE_REGISTRY`].
#[derive(Debug, Clone, Copy)]
pub struct PhaseDesc {
    pub id: PhaseId,
    pub execution_model: ExecutionModel,
    pub allowed_mutations: AllowMutation,
    /// True when module handlers may offload work to worker threads.
    pub thread_safe: bool,
}

impl PhaseDesc {
    /// True when handlers for this phase are awaitable coroutines.
    #[inline]
    #[must_use]
    pub const fn uses_coroutines(&self) -> bool {
        matches!(self.execution_model, ExecutionModel::BarrieredConcurrency)
    }

    #[inline]
    #[must_use]
    pub const fn can_mutate_game_state(&self) -> bool {
        self.allowed_mutations.contains(AllowMutation::GAME_STATE)
    }

    #[inline]
    #[must_use]
    pub const fn can_mutate_frame_state(&self) -> bool {
        self.allowed_mutations.contains(AllowMutation::FRAME_STATE)
    }

    #[inline]
    #[must_use]
    pub const fn can_mutate_engine_state(&self) -> bool {
        self.allowed_mutations.contains(AllowMutation::ENGINE_STATE)
    }
}

/// Canonical phase registry, indexed by `PhaseId::index()`. Entry order is the
/// frame order; keep it in sync with [`PhaseId::ALL`].
pub const PHASE_REGISTRY: [PhaseDesc; PhaseId::COUNT] = [
    PhaseDesc {
        id: PhaseId::FrameStart,
        execution_model: ExecutionModel::SynchronousOrdered,
        allowed_mutations: AllowMutation::ENGINE_STATE,
        thread_safe: false,
    },
    PhaseDesc {
        id: PhaseId::Input,
        execution_model: ExecutionModel::BarrieredConcurrency,
        allowed_mutations: AllowMutation::GAME_STATE,
        thread_safe: false,
    },
    PhaseDesc {
        id: PhaseId::NetworkReconciliation,
        execution_model: ExecutionModel::BarrieredConcurrency,
        allowed_mutations: AllowMutation::GAME_STATE,
        thread_safe: false,
    },
    PhaseDesc {
        id: PhaseId::RandomSeedManagement,
        execution_model: ExecutionModel::EngineInternal,
        allowed_mutations: AllowMutation::GAME_STATE,
        thread_safe: false,
    },
    PhaseDesc {
        id: PhaseId::FixedSimulation,
        execution_model: ExecutionModel::BarrieredConcurrency,
        allowed_mutations: AllowMutation::GAME_STATE,
        thread_safe: false,
    },
    PhaseDesc {
        id: PhaseId::Gameplay,
        execution_model: ExecutionModel::BarrieredConcurrency,
        allowed_mutations: AllowMutation::GAME_STATE,
        thread_safe: false,
    },
    PhaseDesc {
        id: PhaseId::SceneMutation,
        execution_model: ExecutionModel::BarrieredConcurrency,
        allowed_mutations: AllowMutation::GAME_STATE,
        thread_safe: false,
    },
    PhaseDesc {
        id: PhaseId::TransformPropagation,
        execution_model: ExecutionModel::BarrieredConcurrency,
        allowed_mutations: AllowMutation::GAME_STATE,
        thread_safe: false,
    },
    PhaseDesc {
        id: PhaseId::Snapshot,
        execution_model: ExecutionModel::EngineInternal,
        allowed_mutations: AllowMutation::FRAME_STATE,
        thread_safe: false,
    },
    PhaseDesc {
        id: PhaseId::ParallelTasks,
        execution_model: ExecutionModel::DeferredPipelines,
        allowed_mutations: AllowMutation::empty(),
        thread_safe: true,
    },
    PhaseDesc {
        id: PhaseId::PostParallel,
        execution_model: ExecutionModel::BarrieredConcurrency,
        allowed_mutations: AllowMutation::GAME_STATE.union(AllowMutation::FRAME_STATE),
        thread_safe: false,
    },
    PhaseDesc {
        id: PhaseId::GuiUpdate,
        execution_model: ExecutionModel::BarrieredConcurrency,
        allowed_mutations: AllowMutation::FRAME_STATE.union(AllowMutation::ENGINE_STATE),
        thread_safe: false,
    },
    PhaseDesc {
        id: PhaseId::PreRender,
        execution_model: ExecutionModel::BarrieredConcurrency,
        allowed_mutations: AllowMutation::FRAME_STATE.union(AllowMutation::ENGINE_STATE),
        thread_safe: false,
    },
    PhaseDesc {
        id: PhaseId::Render,
        execution_model: ExecutionModel::BarrieredConcurrency,
        allowed_mutations: AllowMutation::FRAME_STATE.union(AllowMutation::ENGINE_STATE),
        thread_safe: true,
    },
    PhaseDesc {
        id: PhaseId::Compositing,
        execution_model: ExecutionModel::SynchronousOrdered,
        allowed_mutations: AllowMutation::FRAME_STATE,
        thread_safe: true,
    },
    PhaseDesc {
        id: PhaseId::Present,
        execution_model: ExecutionModel::EngineInternal,
        allowed_mutations: AllowMutation::empty(),
        thread_safe: false,
    },
    PhaseDesc {
        id: PhaseId::AsyncPoll,
        execution_model: ExecutionModel::BarrieredConcurrency,
        allowed_mutations: AllowMutation::ENGINE_STATE,
        thread_safe: true,
    },
    PhaseDesc {
        id: PhaseId::BudgetAdapt,
        execution_model: ExecutionModel::EngineInternal,
        allowed_mutations: AllowMutation::empty(),
        thread_safe: false,
    },
    PhaseDesc {
        id: PhaseId::FrameEnd,
        execution_model: ExecutionModel::SynchronousOrdered,
        allowed_mutations: AllowMutation::empty(),
        thread_safe: false,
    },
    PhaseDesc {
        id: PhaseId::DetachedServices,
        execution_model: ExecutionModel::Detached,
        allowed_mutations: AllowMutation::empty(),
        thread_safe: true,
    },
];

/// Looks up the registry descriptor for a phase.
#[inline]
#[must_use]
pub const fn phase_desc(phase: PhaseId) -> &'static PhaseDesc {
    &PHASE_REGISTRY[phase.index()]
}

/// True when `phase` may mutate authoritative game state.
#[inline]
#[must_use]
pub const fn can_mutate_game_state(phase: PhaseId) -> bool {
    phase_desc(phase).can_mutate_game_state()
}

/// True when `phase` may mutate transient per-frame outputs.
#[inline]
#[must_use]
pub const fn can_mutate_frame_state(phase: PhaseId) -> bool {
    phase_desc(phase).can_mutate_frame_state()
}

/// True when `phase` may mutate coordinator registries and metadata.
#[inline]
#[must_use]
pub const fn can_mutate_engine_state(phase: PhaseId) -> bool {
    phase_desc(phase).can_mutate_engine_state()
}

/// True when module handlers for `phase` are awaitable.
#[inline]
#[must_use]
pub const fn uses_coroutines(phase: PhaseId) -> bool {
    phase_desc(phase).uses_coroutines()
}

// ============================================================================
// Barriers
// ============================================================================

/// Engine-level synchronization barriers.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarrierId {
    InputSnapshot = 0,
    NetworkReconciled = 1,
    SimulationComplete = 2,
    SceneStable = 3,
    SnapshotReady = 4,
    ParallelComplete = 5,
    CommandReady = 6,
    AsyncPublishReady = 7,
}

impl BarrierId {
    pub const COUNT: usize = 8;

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            BarrierId::InputSnapshot => "B0_InputSnapshot",
            BarrierId::NetworkReconciled => "B1_NetworkReconciled",
            BarrierId::SimulationComplete => "B2_SimulationComplete",
            BarrierId::SceneStable => "B3_SceneStable",
            BarrierId::SnapshotReady => "B4_SnapshotReady",
            BarrierId::ParallelComplete => "B5_ParallelComplete",
            BarrierId::CommandReady => "B6_CommandReady",
            BarrierId::AsyncPublishReady => "B7_AsyncPublishReady",
        }
    }
}

/// Barrier descriptor: the phase after which the barrier is enforced.
#[derive(Debug, Clone, Copy)]
pub struct BarrierDesc {
    pub id: BarrierId,
    pub after_phase: PhaseId,
}

/// Canonical barrier registry, indexed by `BarrierId::index()`.
pub const BARRIER_REGISTRY: [BarrierDesc; BarrierId::COUNT] = [
    BarrierDesc { id: BarrierId::InputSnapshot, after_phase: PhaseId::FrameStart },
    BarrierDesc { id: BarrierId::NetworkReconciled, after_phase: PhaseId::NetworkReconciliation },
    BarrierDesc { id: BarrierId::SimulationComplete, after_phase: PhaseId::FixedSimulation },
    BarrierDesc { id: BarrierId::SceneStable, after_phase: PhaseId::SceneMutation },
    BarrierDesc { id: BarrierId::SnapshotReady, after_phase: PhaseId::TransformPropagation },
    BarrierDesc { id: BarrierId::ParallelComplete, after_phase: PhaseId::ParallelTasks },
    BarrierDesc { id: BarrierId::CommandReady, after_phase: PhaseId::PreRender },
    BarrierDesc { id: BarrierId::AsyncPublishReady, after_phase: PhaseId::AsyncPoll },
];
