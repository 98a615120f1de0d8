//! Core registry types: frame phases, barriers, and bindless handles.

pub mod bindless;
pub mod phase;

pub use bindless::{BindlessIndex, Generation, VersionedBindlessHandle};
pub use phase::{
    AllowMutation, BARRIER_REGISTRY, BarrierDesc, BarrierId, ExecutionModel, PHASE_REGISTRY,
    PhaseDesc, PhaseId, PhaseMask, can_mutate_engine_state, can_mutate_frame_state,
    can_mutate_game_state, phase_desc, uses_coroutines,
};
