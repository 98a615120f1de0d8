//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! The main error type [`EmberError`] covers all failure modes including
//! coordinator and module lifecycle errors, resource registry errors, and
//! asset import failures. All public APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, EmberError>`.

use thiserror::Error;

/// The main error type for the Ember engine.
#[derive(Error, Debug)]
pub enum EmberError {
    // ========================================================================
    // Engine & Module Errors
    // ========================================================================
    /// The engine was asked to run after its frame loop already ended.
    #[error("Engine frame loop ended; the engine must be re-created")]
    EngineFinished,

    /// A module failed to attach and was not registered.
    #[error("Module '{0}' failed to attach")]
    ModuleAttachFailed(String),

    /// A module handler reported a failure.
    #[error("Module '{name}' handler failed: {message}")]
    ModuleFailure {
        /// Module display name
        name: String,
        /// Handler-provided failure description
        message: String,
    },

    /// An engine invariant was violated (permission breach, double publish).
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    // ========================================================================
    // Resource & Cache Errors
    // ========================================================================
    /// The resource is not registered with the registry.
    #[error("Resource {0:#x} is not registered")]
    ResourceNotRegistered(u64),

    /// A descriptor allocator returned an invalid slot.
    #[error("Descriptor allocation failed: {0}")]
    DescriptorAllocationFailed(String),

    /// The resource's view factory produced an invalid native view.
    #[error("View creation failed on resource {0:#x}")]
    ViewCreationFailed(u64),

    /// Insertion was rejected because the cache budget is exhausted.
    #[error("Cache budget exhausted: need {needed}, free {free}")]
    CacheBudgetExhausted {
        /// Cost of the rejected entry
        needed: u64,
        /// Budget headroom after evicting everything evictable
        free: u64,
    },

    /// The stored value has a different type than requested.
    #[error("Cache entry {0:#x} holds a different type")]
    CacheTypeMismatch(u64),

    // ========================================================================
    // Import Errors
    // ========================================================================
    /// Adding the dependency edge would create a cycle in the import plan.
    #[error("Import plan cycle: {from} -> {to}")]
    ImportCycle {
        /// Source item debug label
        from: String,
        /// Target item debug label
        to: String,
    },

    /// The import plan stalled with incomplete items and no pending work.
    #[error("Import plan deadlock: no pending work but plan incomplete")]
    ImportDeadlock,

    /// Cooperative cancellation was requested.
    #[error("Operation canceled")]
    Canceled,

    /// The pipeline is closed and accepts no further submissions.
    #[error("Pipeline closed")]
    PipelineClosed,

    /// An asset cook failed; details travel in the import diagnostics.
    #[error("Asset cook failed: {0}")]
    CookFailed(String),

    /// An offloaded thread-pool task failed to complete.
    #[error("Task join error: {0}")]
    TaskJoin(String),

    // ========================================================================
    // I/O & Serialization Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error (import reports).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Alias for `Result<T, EmberError>`.
pub type Result<T> = std::result::Result<T, EmberError>;
