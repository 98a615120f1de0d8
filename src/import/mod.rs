//! Async asset import pipeline
//!
//! Cooks source assets into engine-consumable payloads: a plan DAG of work
//! items, per-kind bounded pipelines with worker tasks, a session collecting
//! emitted payloads and diagnostics, and the dispatcher driving the plan
//! under back-pressure and cooperative cancellation.

pub mod adapter;
pub mod diagnostics;
pub mod dispatcher;
pub mod pipeline;
pub mod plan;
pub mod session;
pub mod work;

pub use adapter::{AdapterOutput, SourceAdapter};
pub use diagnostics::{ImportDiagnostic, ImportSeverity};
pub use dispatcher::{ImportConcurrency, WorkDispatcher};
pub use pipeline::{
    BufferPipeline, CookKind, CookPipeline, GeometryPipeline, MaterialPipeline, PipelineConfig,
    ScenePipeline, TexturePipeline,
};
pub use plan::{ImportPlan, PlanItem, PlanItemId, PlanItemKind};
pub use session::{AssetType, EmittedAsset, ImportReport, ImportSession};
pub use work::{
    AssetKey, BufferWorkItem, GeometryWorkItem, MaterialTextureBinding, MaterialWorkItem,
    SceneWorkItem, TextureWorkItem, WorkResult,
};
