//! Encode stage: FFmpeg over the rendered frames.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use aforge_models::JobState;

use crate::config::PipelineConfig;
use crate::error::{ProcessError, StageError};
use crate::process::{ProcessCommand, ProcessRunner};
use crate::progress::{parse_counter, to_percent};
use crate::stage::{ProgressFn, Stage, StageContext};

/// Slice of the overall job percentage the encode stage reports into.
pub const ENCODE_BAND: (u8, u8) = (80, 95);

/// FFmpeg's `-progress` stream reports bare frame counters.
pub const ENCODE_PROGRESS_PATTERN: &str = r"^frame=\s*(\d+)";

/// The `-progress` stream terminates with `progress=end`; a zero exit
/// without it means the stream was truncated and the output cannot be
/// trusted.
pub const ENCODE_COMPLETION_MARKER: &str = "progress=end";

const STAGE_NAME: &str = "encode";

/// Assembles the rendered frames into the final MP4.
pub struct EncodeStage {
    program: String,
    timeout: Duration,
    band: (u8, u8),
    counter_pattern: Regex,
}

impl EncodeStage {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            program: config.encoder_bin.clone(),
            timeout: config.encode_timeout,
            band: ENCODE_BAND,
            counter_pattern: Regex::new(ENCODE_PROGRESS_PATTERN)
                .expect("encode progress pattern is valid"),
        }
    }

    fn build_args(&self, ctx: &StageContext) -> Vec<String> {
        let settings = &ctx.settings;
        vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-progress".to_string(),
            "pipe:2".to_string(),
            "-framerate".to_string(),
            settings.fps.to_string(),
            "-i".to_string(),
            ctx.frames_dir()
                .join("frame_%03d.png")
                .to_string_lossy()
                .to_string(),
            "-c:v".to_string(),
            settings.codec.clone(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-preset".to_string(),
            settings.preset.clone(),
            "-crf".to_string(),
            settings.crf.to_string(),
            ctx.output_path().to_string_lossy().to_string(),
        ]
    }

    fn stage_error(&self, source: ProcessError) -> StageError {
        StageError::new(STAGE_NAME, source)
    }
}

#[async_trait]
impl Stage for EncodeStage {
    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    fn state(&self) -> JobState {
        JobState::Encoding
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        progress: ProgressFn,
    ) -> Result<Option<PathBuf>, StageError> {
        // The render stage's output is this stage's input.
        let frames_dir = ctx.frames_dir();
        if !frames_dir.is_dir() {
            return Err(self.stage_error(ProcessError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("frames directory missing: {}", frames_dir.display()),
            ))));
        }

        progress(self.band.0, None, None);

        let cmd = ProcessCommand::new(&self.program, ENCODE_COMPLETION_MARKER)
            .args(self.build_args(ctx))
            .current_dir(&ctx.work_dir);

        let mut runner = ProcessRunner::new(self.timeout);
        if let Some(ref cancel_rx) = ctx.cancel_rx {
            runner = runner.with_cancel(cancel_rx.clone());
        }

        // The counter carries no total of its own; map it against the
        // frame count the renderer was asked for.
        let pattern = self.counter_pattern.clone();
        let (lo, hi) = self.band;
        let total_frames = ctx.settings.frame_count;
        runner
            .run(&cmd, move |line| {
                if let Some(frame) = parse_counter(line, &pattern) {
                    let percent = to_percent(frame, total_frames as u64, lo, hi);
                    progress(percent, Some(frame as u32), Some(total_frames));
                }
            })
            .await
            .map_err(|e| self.stage_error(e))?;

        Ok(Some(ctx.output_path()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aforge_models::{JobId, RenderSettings};

    fn test_ctx() -> StageContext {
        StageContext {
            job_id: JobId::from_string("j1"),
            prompt: "walk".to_string(),
            work_dir: PathBuf::from("/work/j1"),
            settings: RenderSettings::default(),
            cancel_rx: None,
        }
    }

    #[test]
    fn test_build_args() {
        let stage = EncodeStage::new(&PipelineConfig::default());
        let args = stage.build_args(&test_ctx());

        assert!(args.contains(&"-progress".to_string()));
        assert!(args.contains(&"pipe:2".to_string()));
        assert!(args.contains(&"/work/j1/frames/frame_%03d.png".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"yuv420p".to_string()));
        assert_eq!(args.last().unwrap(), "/work/j1/output.mp4");
    }

    #[test]
    fn test_counter_pattern_matches_progress_stream() {
        let stage = EncodeStage::new(&PipelineConfig::default());
        assert_eq!(parse_counter("frame=42", &stage.counter_pattern), Some(42));
        assert_eq!(parse_counter("progress=end", &stage.counter_pattern), None);
    }
}
