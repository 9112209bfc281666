//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use aforge_models::RenderSettings;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root directory for per-job work areas
    pub work_root: PathBuf,
    /// Renderer binary (Blender)
    pub renderer_bin: String,
    /// Encoder binary (FFmpeg)
    pub encoder_bin: String,
    /// Deadline for the render stage
    pub render_timeout: Duration,
    /// Deadline for the encode stage
    pub encode_timeout: Duration,
    /// Maximum pipeline runs executing at once; excess jobs wait in `Queued`
    pub max_concurrent_jobs: usize,
    /// Animation settings applied to every job
    pub settings: RenderSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_root: PathBuf::from("/tmp/animaforge"),
            renderer_bin: "blender".to_string(),
            encoder_bin: "ffmpeg".to_string(),
            render_timeout: Duration::from_secs(600), // 10 minutes
            encode_timeout: Duration::from_secs(300), // 5 minutes
            max_concurrent_jobs: 2,
            settings: RenderSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let mut settings = RenderSettings::default();
        if let Some(frames) = std::env::var("AFORGE_FRAME_COUNT")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            settings.frame_count = frames;
        }
        if let Some(fps) = std::env::var("AFORGE_FPS").ok().and_then(|s| s.parse().ok()) {
            settings.fps = fps;
        }

        Self {
            work_root: std::env::var("AFORGE_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/animaforge")),
            renderer_bin: std::env::var("AFORGE_BLENDER_BIN")
                .unwrap_or_else(|_| "blender".to_string()),
            encoder_bin: std::env::var("AFORGE_FFMPEG_BIN")
                .unwrap_or_else(|_| "ffmpeg".to_string()),
            render_timeout: Duration::from_secs(
                std::env::var("AFORGE_RENDER_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            encode_timeout: Duration::from_secs(
                std::env::var("AFORGE_ENCODE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            max_concurrent_jobs: std::env::var("AFORGE_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            settings,
        }
    }
}
