//! Error types for the animation pipeline.

use aforge_models::{JobId, TransitionError};
use thiserror::Error;

/// Result type for orchestrator-level operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors from supervising a single external process invocation.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("'{program}' not found in PATH")]
    BinaryNotFound { program: String },

    #[error("failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {}", exit_label(.code))]
    Exit { program: String, code: Option<i32> },

    #[error("'{program}' exited cleanly but never reported '{marker}'")]
    IncompleteOutput { program: String, marker: String },

    #[error("'{program}' timed out after {secs} seconds")]
    Timeout { program: String, secs: u64 },

    #[error("'{program}' was cancelled")]
    Cancelled { program: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "no exit code (killed by signal)".to_string(),
    }
}

impl ProcessError {
    /// Short machine-ish label embedded into diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProcessError::BinaryNotFound { .. } | ProcessError::Spawn { .. } => "spawn_failure",
            ProcessError::Exit { .. } => "exit_failure",
            ProcessError::IncompleteOutput { .. } => "incomplete_output",
            ProcessError::Timeout { .. } => "timeout",
            ProcessError::Cancelled { .. } => "cancelled",
            ProcessError::Io(_) => "io",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProcessError::Cancelled { .. })
    }
}

/// Errors from the in-memory job store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job '{0}' already exists")]
    DuplicateId(JobId),

    #[error("job '{0}' not found")]
    NotFound(JobId),

    #[error("invalid transition: {0}")]
    InvalidTransition(#[from] TransitionError),
}

impl StoreError {
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, StoreError::InvalidTransition(_))
    }
}

/// A pipeline stage failure, tagged with the stage that produced it.
#[derive(Debug, Error)]
#[error("{stage} stage failed ({}): {source}", .source.kind())]
pub struct StageError {
    pub stage: &'static str,
    #[source]
    pub source: ProcessError,
}

impl StageError {
    pub fn new(stage: &'static str, source: ProcessError) -> Self {
        Self { stage, source }
    }
}

/// Orchestrator-level errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_embed_diagnostics() {
        let err = StageError::new(
            "render",
            ProcessError::IncompleteOutput {
                program: "blender".to_string(),
                marker: "RENDER_COMPLETE".to_string(),
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("render stage failed"));
        assert!(msg.contains("incomplete_output"));
        assert!(msg.contains("RENDER_COMPLETE"));
    }

    #[test]
    fn test_exit_label() {
        let err = ProcessError::Exit {
            program: "ffmpeg".to_string(),
            code: Some(1),
        };
        assert!(err.to_string().contains("code 1"));

        let killed = ProcessError::Exit {
            program: "ffmpeg".to_string(),
            code: None,
        };
        assert!(killed.to_string().contains("signal"));
    }
}
