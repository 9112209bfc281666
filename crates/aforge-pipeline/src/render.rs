//! Render stage: Blender in background mode.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use aforge_models::JobState;

use crate::config::PipelineConfig;
use crate::error::{ProcessError, StageError};
use crate::process::{ProcessCommand, ProcessRunner};
use crate::progress::{parse_unit_progress, to_percent};
use crate::scene;
use crate::stage::{ProgressFn, Stage, StageContext};

/// Slice of the overall job percentage the render stage reports into.
pub const RENDER_BAND: (u8, u8) = (10, 80);

const STAGE_NAME: &str = "render";
const SCRIPT_FILENAME: &str = "animate_scene.py";

/// Drives the renderer over a generated scene script.
pub struct RenderStage {
    program: String,
    timeout: Duration,
    band: (u8, u8),
    progress_pattern: Regex,
}

impl RenderStage {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            program: config.renderer_bin.clone(),
            timeout: config.render_timeout,
            band: RENDER_BAND,
            progress_pattern: Regex::new(scene::PROGRESS_LINE_PATTERN)
                .expect("render progress pattern is valid"),
        }
    }

    fn build_args(&self, script_path: &Path) -> Vec<String> {
        vec![
            "--background".to_string(),
            "--python".to_string(),
            script_path.to_string_lossy().to_string(),
        ]
    }

    fn stage_error(&self, source: ProcessError) -> StageError {
        StageError::new(STAGE_NAME, source)
    }
}

#[async_trait]
impl Stage for RenderStage {
    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    fn state(&self) -> JobState {
        JobState::Rendering
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        progress: ProgressFn,
    ) -> Result<Option<PathBuf>, StageError> {
        // Precondition: the frame output area must exist before the
        // renderer starts.
        let frames_dir = ctx.frames_dir();
        tokio::fs::create_dir_all(&frames_dir)
            .await
            .map_err(|e| self.stage_error(e.into()))?;

        let script = scene::build_script(&ctx.prompt, &frames_dir, &ctx.settings);
        let script_path = ctx.work_dir.join(SCRIPT_FILENAME);
        tokio::fs::write(&script_path, script)
            .await
            .map_err(|e| self.stage_error(e.into()))?;
        debug!(job_id = %ctx.job_id, "Wrote scene script to {:?}", script_path);

        progress(self.band.0, None, None);

        let cmd = ProcessCommand::new(&self.program, scene::COMPLETION_MARKER)
            .args(self.build_args(&script_path))
            .current_dir(&ctx.work_dir);

        let mut runner = ProcessRunner::new(self.timeout);
        if let Some(ref cancel_rx) = ctx.cancel_rx {
            runner = runner.with_cancel(cancel_rx.clone());
        }

        let pattern = self.progress_pattern.clone();
        let (lo, hi) = self.band;
        runner
            .run(&cmd, move |line| {
                if let Some((frame, total)) = parse_unit_progress(line, &pattern) {
                    let percent = to_percent(frame, total, lo, hi);
                    progress(percent, Some(frame as u32), Some(total as u32));
                }
            })
            .await
            .map_err(|e| self.stage_error(e))?;

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args() {
        let stage = RenderStage::new(&PipelineConfig::default());
        let args = stage.build_args(Path::new("/work/j1/animate_scene.py"));
        assert_eq!(
            args,
            vec!["--background", "--python", "/work/j1/animate_scene.py"]
        );
    }

    #[test]
    fn test_band_maps_into_job_percentage() {
        assert_eq!(to_percent(240, 480, RENDER_BAND.0, RENDER_BAND.1), 45);
        assert_eq!(to_percent(480, 480, RENDER_BAND.0, RENDER_BAND.1), 80);
    }
}
