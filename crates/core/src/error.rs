// crates/core/src/error.rs
use thiserror::Error;

/// Errors surfaced to callers of the job registry.
///
/// Store connectivity problems are deliberately absent: the status store
/// degrades to its in-memory backend instead of failing, and stage-runner
/// faults are converted into a terminal `failed` status rather than an error.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Prompt is required")]
    InvalidPrompt,

    #[error("Job not found: {0}")]
    NotFound(String),

    /// A freshly allocated job id already had a record. Timestamp+random ids
    /// make this effectively impossible; if it happens the caller must retry
    /// rather than overwrite the live record.
    #[error("Job id collision: {0}")]
    IdCollision(String),
}
