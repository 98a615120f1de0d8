//! Source adapter seam
//!
//! Concrete asset formats (glTF parsing, image codecs) live outside the
//! engine core. The import pipeline sees them only as [`SourceAdapter`]s:
//! given a source path and its bytes, an adapter appends work items (and
//! their dependency edges) to the plan and returns diagnostics.

use crate::import::diagnostics::ImportDiagnostic;
use crate::import::plan::{ImportPlan, PlanItemId};

/// Items an adapter contributed for one source, in plan order.
#[derive(Debug, Default)]
pub struct AdapterOutput {
    pub items: Vec<PlanItemId>,
    pub diagnostics: Vec<ImportDiagnostic>,
}

/// Translates one source into plan work items.
pub trait SourceAdapter {
    /// Short name used in diagnostics (`gltf`, `png`).
    fn name(&self) -> &str;

    /// True when this adapter recognizes the source path.
    fn accepts(&self, source_path: &str) -> bool;

    /// Parses `bytes` and appends work items and dependency edges to `plan`.
    /// Parse failures surface as diagnostics in the output, not as errors;
    /// the plan stays valid either way.
    fn emit_work(&self, source_path: &str, bytes: &[u8], plan: &mut ImportPlan) -> AdapterOutput;
}
