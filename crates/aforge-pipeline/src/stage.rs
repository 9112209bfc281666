//! Pipeline stage contract.
//!
//! A stage is one sequential phase of a job, backed by one external
//! process invocation. The orchestrator walks an ordered list of
//! stages, so inserting a phase (say, a post-processing pass) means
//! adding a bundle here, not touching control flow.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use aforge_models::{JobId, JobState, RenderSettings};

use crate::error::StageError;

/// Progress sink a stage reports through: overall percent plus
/// optional frame counters. Bound by the orchestrator to the job store.
pub type ProgressFn = Arc<dyn Fn(u8, Option<u32>, Option<u32>) + Send + Sync>;

/// Per-job context handed to every stage.
///
/// The work dir is owned exclusively by this job's run; stages chain
/// through well-known paths inside it rather than passing artifacts
/// around.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub job_id: JobId,
    pub prompt: String,
    pub work_dir: PathBuf,
    pub settings: RenderSettings,
    /// Flips to true when the job is cancelled.
    pub cancel_rx: Option<watch::Receiver<bool>>,
}

impl StageContext {
    /// Where the renderer writes frames and the encoder reads them.
    pub fn frames_dir(&self) -> PathBuf {
        self.work_dir.join("frames")
    }

    /// Where the finished video lands.
    pub fn output_path(&self) -> PathBuf {
        self.work_dir.join("output.mp4")
    }
}

/// One phase of the animation pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// The job state held while this stage runs.
    fn state(&self) -> JobState;

    /// Run the stage to completion, reporting progress as output
    /// arrives. Returns the artifact the stage produced, if any.
    async fn execute(
        &self,
        ctx: &StageContext,
        progress: ProgressFn,
    ) -> Result<Option<PathBuf>, StageError>;
}
