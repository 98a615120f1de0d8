//! Import diagnostics
//!
//! Every work result and the session report carry machine-readable
//! diagnostics: a severity, a stable code (`texture.cook_failed`,
//! `mesh.missing_positions`), a human message, and the source/object paths
//! the diagnostic refers to.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportSeverity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportDiagnostic {
    pub severity: ImportSeverity,
    /// Stable machine-readable code, e.g. `texture.cook_failed`.
    pub code: String,
    pub message: String,
    /// Source file or logical source the diagnostic refers to.
    pub source_path: String,
    /// Path of the object within the source, when narrower than the source.
    pub object_path: String,
}

impl ImportDiagnostic {
    #[must_use]
    pub fn error(
        code: impl Into<String>,
        message: impl Into<String>,
        source_path: impl Into<String>,
        object_path: impl Into<String>,
    ) -> Self {
        Self {
            severity: ImportSeverity::Error,
            code: code.into(),
            message: message.into(),
            source_path: source_path.into(),
            object_path: object_path.into(),
        }
    }

    #[must_use]
    pub fn warning(
        code: impl Into<String>,
        message: impl Into<String>,
        source_path: impl Into<String>,
        object_path: impl Into<String>,
    ) -> Self {
        Self {
            severity: ImportSeverity::Warning,
            code: code.into(),
            message: message.into(),
            source_path: source_path.into(),
            object_path: object_path.into(),
        }
    }
}

/// Downgrades error diagnostics to warnings, used when a placeholder
/// substitution makes the failure survivable.
pub fn downgrade_errors(diagnostics: &mut [ImportDiagnostic]) {
    for diagnostic in diagnostics {
        if diagnostic.severity == ImportSeverity::Error {
            diagnostic.severity = ImportSeverity::Warning;
        }
    }
}

#[must_use]
pub fn has_error(diagnostics: &[ImportDiagnostic]) -> bool {
    diagnostics.iter().any(|d| d.severity == ImportSeverity::Error)
}
