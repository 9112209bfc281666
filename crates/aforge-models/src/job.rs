//! Job records and lifecycle states.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle state.
///
/// States advance along a fixed graph and never move backward:
///
/// ```text
/// Queued -> Rendering -> Encoding -> Done
///    \          \            \
///     +----------+------------+--> Error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Job accepted, pipeline not yet started
    #[default]
    Queued,
    /// Renderer is producing frames
    Rendering,
    /// Encoder is producing the final video
    Encoding,
    /// Finished artifact available
    Done,
    /// Job failed
    Error,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Rendering => "rendering",
            JobState::Encoding => "encoding",
            JobState::Done => "done",
            JobState::Error => "error",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Error)
    }

    /// Check whether `next` is a forward edge of the state graph from here.
    pub fn can_advance_to(&self, next: JobState) -> bool {
        match (self, next) {
            (JobState::Queued, JobState::Rendering) => true,
            (JobState::Rendering, JobState::Encoding) => true,
            (JobState::Encoding, JobState::Done) => true,
            (JobState::Queued | JobState::Rendering | JobState::Encoding, JobState::Error) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One end-to-end animation request tracked from submission to completion.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,
    /// Original request text
    pub prompt: String,
    /// Current lifecycle state
    pub state: JobState,
    /// Overall progress percentage (0-100)
    pub progress: u8,
    /// Last frame the renderer or encoder reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_frame: Option<u32>,
    /// Total frames in the animation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_frames: Option<u32>,
    /// Human-readable failure description, present only in `Error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// Finished video location, present only in `Done`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<PathBuf>,
    /// When the job was submitted
    pub created_at: DateTime<Utc>,
    /// When the record was last mutated
    pub updated_at: DateTime<Utc>,
    /// When the job entered a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new queued job.
    pub fn new(id: JobId, prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            prompt: prompt.into(),
            state: JobState::Queued,
            progress: 0,
            current_frame: None,
            total_frames: None,
            error_detail: None,
            artifact_path: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Merge a partial update into the record, bumping `updated_at`.
    ///
    /// The merge is all-or-nothing: every field is validated against the
    /// monotonicity rules before anything is written. Terminal records
    /// reject all further mutation.
    pub fn apply(&mut self, update: &JobUpdate) -> Result<(), TransitionError> {
        if self.state.is_terminal() {
            return Err(TransitionError::Terminal(self.state));
        }

        if let Some(next) = update.state {
            // Re-asserting the current state is a harmless no-op write.
            if next != self.state && !self.state.can_advance_to(next) {
                return Err(TransitionError::BackwardState {
                    from: self.state,
                    to: next,
                });
            }
        }
        if let Some(progress) = update.progress {
            if progress < self.progress {
                return Err(TransitionError::ProgressDecrease {
                    from: self.progress,
                    to: progress,
                });
            }
        }
        if let (Some(frame), Some(stored)) = (update.current_frame, self.current_frame) {
            if frame < stored {
                return Err(TransitionError::FrameDecrease {
                    from: stored,
                    to: frame,
                });
            }
        }

        if let Some(next) = update.state {
            self.state = next;
            if next.is_terminal() && self.completed_at.is_none() {
                self.completed_at = Some(Utc::now());
            }
        }
        if let Some(progress) = update.progress {
            self.progress = progress.min(100);
        }
        if let Some(frame) = update.current_frame {
            self.current_frame = Some(frame);
        }
        if let Some(total) = update.total_frames {
            self.total_frames = Some(total);
        }
        if let Some(ref detail) = update.error_detail {
            self.error_detail = Some(detail.clone());
        }
        if let Some(ref path) = update.artifact_path {
            self.artifact_path = Some(path.clone());
        }
        self.updated_at = Utc::now();

        Ok(())
    }
}

/// Partial update applied atomically to a job record.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub state: Option<JobState>,
    pub progress: Option<u8>,
    pub current_frame: Option<u32>,
    pub total_frames: Option<u32>,
    pub error_detail: Option<String>,
    pub artifact_path: Option<PathBuf>,
}

impl JobUpdate {
    pub fn state(mut self, state: JobState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn frames(mut self, current: u32, total: u32) -> Self {
        self.current_frame = Some(current);
        self.total_frames = Some(total);
        self
    }

    pub fn error_detail(mut self, detail: impl Into<String>) -> Self {
        self.error_detail = Some(detail.into());
        self
    }

    pub fn artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_path = Some(path.into());
        self
    }
}

/// A rejected job mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("job already terminal in state '{0}'")]
    Terminal(JobState),

    #[error("state cannot move from '{from}' to '{to}'")]
    BackwardState { from: JobState, to: JobState },

    #[error("progress cannot decrease ({from} -> {to})")]
    ProgressDecrease { from: u8, to: u8 },

    #[error("frame counter cannot decrease ({from} -> {to})")]
    FrameDecrease { from: u32, to: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_queued() {
        let job = Job::new(JobId::new(), "steve walks");
        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.progress, 0);
        assert!(!job.is_terminal());
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn test_forward_edges() {
        assert!(JobState::Queued.can_advance_to(JobState::Rendering));
        assert!(JobState::Rendering.can_advance_to(JobState::Encoding));
        assert!(JobState::Encoding.can_advance_to(JobState::Done));
        assert!(JobState::Queued.can_advance_to(JobState::Error));
        assert!(JobState::Rendering.can_advance_to(JobState::Error));
        assert!(JobState::Encoding.can_advance_to(JobState::Error));

        assert!(!JobState::Queued.can_advance_to(JobState::Encoding));
        assert!(!JobState::Queued.can_advance_to(JobState::Done));
        assert!(!JobState::Rendering.can_advance_to(JobState::Queued));
        assert!(!JobState::Done.can_advance_to(JobState::Rendering));
        assert!(!JobState::Error.can_advance_to(JobState::Rendering));
    }

    #[test]
    fn test_apply_happy_path() {
        let mut job = Job::new(JobId::new(), "creeper dances");

        job.apply(&JobUpdate::default().state(JobState::Rendering).progress(10))
            .unwrap();
        assert_eq!(job.state, JobState::Rendering);
        assert_eq!(job.progress, 10);

        job.apply(&JobUpdate::default().progress(45).frames(240, 480))
            .unwrap();
        assert_eq!(job.current_frame, Some(240));
        assert_eq!(job.total_frames, Some(480));

        job.apply(&JobUpdate::default().state(JobState::Encoding).progress(80))
            .unwrap();
        job.apply(
            &JobUpdate::default()
                .state(JobState::Done)
                .progress(100)
                .artifact_path("/tmp/out.mp4"),
        )
        .unwrap();

        assert!(job.is_terminal());
        assert_eq!(job.progress, 100);
        assert!(job.completed_at.is_some());
        assert!(job.artifact_path.is_some());
    }

    #[test]
    fn test_apply_rejects_backward_state() {
        let mut job = Job::new(JobId::new(), "walk");
        job.apply(&JobUpdate::default().state(JobState::Rendering))
            .unwrap();

        let err = job
            .apply(&JobUpdate::default().state(JobState::Queued))
            .unwrap_err();
        assert!(matches!(err, TransitionError::BackwardState { .. }));
        assert_eq!(job.state, JobState::Rendering);
    }

    #[test]
    fn test_apply_rejects_progress_decrease() {
        let mut job = Job::new(JobId::new(), "walk");
        job.apply(&JobUpdate::default().state(JobState::Rendering).progress(40))
            .unwrap();

        let err = job
            .apply(&JobUpdate::default().progress(30))
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::ProgressDecrease { from: 40, to: 30 }
        );
        assert_eq!(job.progress, 40);
    }

    #[test]
    fn test_apply_rejects_frame_decrease() {
        let mut job = Job::new(JobId::new(), "walk");
        job.apply(&JobUpdate::default().state(JobState::Rendering).frames(50, 480))
            .unwrap();

        let err = job
            .apply(&JobUpdate::default().frames(40, 480))
            .unwrap_err();
        assert!(matches!(err, TransitionError::FrameDecrease { .. }));
    }

    #[test]
    fn test_terminal_records_are_immutable() {
        let mut job = Job::new(JobId::new(), "walk");
        job.apply(&JobUpdate::default().state(JobState::Error).error_detail("boom"))
            .unwrap();
        let completed = job.completed_at;

        let err = job
            .apply(&JobUpdate::default().progress(99))
            .unwrap_err();
        assert_eq!(err, TransitionError::Terminal(JobState::Error));
        assert_eq!(job.completed_at, completed);
    }

    #[test]
    fn test_reasserting_current_state_is_noop_edge() {
        let mut job = Job::new(JobId::new(), "walk");
        job.apply(&JobUpdate::default().state(JobState::Rendering))
            .unwrap();
        job.apply(&JobUpdate::default().state(JobState::Rendering).progress(12))
            .unwrap();
        assert_eq!(job.state, JobState::Rendering);
        assert_eq!(job.progress, 12);
    }

    #[test]
    fn test_state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&JobState::Rendering).unwrap(),
            "\"rendering\""
        );
        assert_eq!(JobState::Done.as_str(), "done");
    }
}
