//! Per-job pipeline orchestration.
//!
//! One supervised run exists per job and is the only writer of that
//! job's record. The run walks the stage list in order and translates
//! every outcome (success, stage failure, cancellation, even a panic
//! in stage code) into a terminal state transition, so a job is never
//! left non-terminal with no supervisor.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{watch, Semaphore};
use tracing::{error, info, trace, warn};

use aforge_models::{JobId, JobState, JobUpdate};

use crate::config::PipelineConfig;
use crate::encode::EncodeStage;
use crate::error::{PipelineError, PipelineResult, StoreError};
use crate::render::RenderStage;
use crate::stage::{ProgressFn, Stage, StageContext};
use crate::store::JobStore;

/// Progress reported once the job's work area is prepared.
const PREPARED_PROGRESS: u8 = 5;

/// Drives jobs through the stage pipeline.
pub struct Orchestrator {
    store: JobStore,
    config: PipelineConfig,
    stages: Vec<Arc<dyn Stage>>,
    job_semaphore: Arc<Semaphore>,
    cancellations: DashMap<JobId, watch::Sender<bool>>,
}

impl Orchestrator {
    /// Create an orchestrator with the standard render/encode pipeline.
    pub fn new(store: JobStore, config: PipelineConfig) -> Arc<Self> {
        let stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(RenderStage::new(&config)),
            Arc::new(EncodeStage::new(&config)),
        ];
        Self::with_stages(store, config, stages)
    }

    /// Create an orchestrator over an arbitrary stage list.
    pub fn with_stages(
        store: JobStore,
        config: PipelineConfig,
        stages: Vec<Arc<dyn Stage>>,
    ) -> Arc<Self> {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        Arc::new(Self {
            store,
            config,
            stages,
            job_semaphore,
            cancellations: DashMap::new(),
        })
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Launch the supervised run for an already-created job. Returns
    /// immediately; the run proceeds on its own task.
    pub fn start(self: &Arc<Self>, job_id: JobId) {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let (cancel_tx, cancel_rx) = watch::channel(false);
            orchestrator
                .cancellations
                .insert(job_id.clone(), cancel_tx);

            // The run executes on its own task so that a panic inside
            // stage code surfaces here as a JoinError instead of taking
            // the supervisor down with it.
            let run = tokio::spawn({
                let orchestrator = Arc::clone(&orchestrator);
                let job_id = job_id.clone();
                async move { orchestrator.run_job(job_id, cancel_rx).await }
            });

            match run.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => orchestrator.fail(&job_id, e.to_string()),
                Err(join_err) => orchestrator.fail(
                    &job_id,
                    format!("pipeline task failed unexpectedly: {join_err}"),
                ),
            }

            orchestrator.cancellations.remove(&job_id);
        });
    }

    /// Cancel a running job. Returns false when no run is in flight.
    ///
    /// The signal propagates to the stage's process runner, which kills
    /// the external process before the job settles in `Error`.
    pub fn cancel(&self, job_id: &JobId) -> bool {
        match self.cancellations.get(job_id) {
            Some(cancel_tx) => cancel_tx.send(true).is_ok(),
            None => false,
        }
    }

    async fn run_job(
        &self,
        job_id: JobId,
        cancel_rx: watch::Receiver<bool>,
    ) -> PipelineResult<()> {
        let _permit = self.job_semaphore.acquire().await.unwrap();

        let job = self
            .store
            .get(&job_id)
            .ok_or_else(|| PipelineError::Store(StoreError::NotFound(job_id.clone())))?;

        info!(job_id = %job_id, "Starting animation pipeline");

        // Prepare: this job's exclusive work area.
        let work_dir = self.config.work_root.join(job_id.as_str());
        tokio::fs::create_dir_all(&work_dir).await?;
        self.store
            .update(&job_id, JobUpdate::default().progress(PREPARED_PROGRESS))?;

        let ctx = StageContext {
            job_id: job_id.clone(),
            prompt: job.prompt,
            work_dir,
            settings: self.config.settings.clone(),
            cancel_rx: Some(cancel_rx),
        };

        let mut artifact = None;
        for stage in &self.stages {
            self.store
                .update(&job_id, JobUpdate::default().state(stage.state()))?;
            info!(job_id = %job_id, stage = stage.name(), "Stage started");

            artifact = stage.execute(&ctx, self.progress_fn(&job_id)).await?;
            info!(job_id = %job_id, stage = stage.name(), "Stage complete");
        }

        let mut update = JobUpdate::default().state(JobState::Done).progress(100);
        if let Some(path) = artifact {
            update = update.artifact_path(path);
        }
        self.store.update(&job_id, update)?;

        info!(job_id = %job_id, "Job complete");
        Ok(())
    }

    /// Bind a progress sink to this job's record. Out-of-order arrivals
    /// are rejected by the store and dropped, never applied.
    fn progress_fn(&self, job_id: &JobId) -> ProgressFn {
        let store = self.store.clone();
        let job_id = job_id.clone();
        Arc::new(move |percent, current_frame, total_frames| {
            let mut update = JobUpdate::default().progress(percent);
            if let (Some(current), Some(total)) = (current_frame, total_frames) {
                update = update.frames(current, total);
            }
            if let Err(e) = store.update(&job_id, update) {
                trace!(job_id = %job_id, "Dropping stale progress update: {e}");
            }
        })
    }

    /// Settle a failed run in `Error` with a human-readable detail.
    fn fail(&self, job_id: &JobId, detail: String) {
        warn!(job_id = %job_id, "Job failed: {detail}");
        let update = JobUpdate::default()
            .state(JobState::Error)
            .error_detail(detail);
        if let Err(e) = self.store.update(job_id, update) {
            // The orchestrator is the record's only writer, so a
            // rejected terminal transition is an orchestration bug.
            error!(job_id = %job_id, "Failed to record job failure: {e}");
        }
    }
}
