//! Render and encode settings shared by the pipeline stages.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default animation length in frames (20 seconds at 24 fps)
pub const DEFAULT_FRAME_COUNT: u32 = 480;
/// Default frame rate
pub const DEFAULT_FPS: u32 = 24;
/// Default render resolution
pub const DEFAULT_RESOLUTION: (u32, u32) = (1920, 1080);
/// Default resolution percentage (renders at half size for speed)
pub const DEFAULT_RESOLUTION_PERCENT: u32 = 50;
/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "medium";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 23;

/// Settings for one animation render.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RenderSettings {
    /// Number of frames to render
    #[serde(default = "default_frame_count")]
    pub frame_count: u32,

    /// Frames per second
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Render width in pixels
    #[serde(default = "default_width")]
    pub width: u32,

    /// Render height in pixels
    #[serde(default = "default_height")]
    pub height: u32,

    /// Resolution percentage applied by the renderer (1-100)
    #[serde(default = "default_resolution_percent")]
    pub resolution_percent: u32,

    /// Video codec for the encode stage
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,
}

fn default_frame_count() -> u32 {
    DEFAULT_FRAME_COUNT
}
fn default_fps() -> u32 {
    DEFAULT_FPS
}
fn default_width() -> u32 {
    DEFAULT_RESOLUTION.0
}
fn default_height() -> u32 {
    DEFAULT_RESOLUTION.1
}
fn default_resolution_percent() -> u32 {
    DEFAULT_RESOLUTION_PERCENT
}
fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            frame_count: DEFAULT_FRAME_COUNT,
            fps: DEFAULT_FPS,
            width: DEFAULT_RESOLUTION.0,
            height: DEFAULT_RESOLUTION.1,
            resolution_percent: DEFAULT_RESOLUTION_PERCENT,
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
        }
    }
}

impl RenderSettings {
    /// Animation duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        if self.fps == 0 {
            return 0.0;
        }
        self.frame_count as f64 / self.fps as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = RenderSettings::default();
        assert_eq!(settings.frame_count, 480);
        assert_eq!(settings.fps, 24);
        assert!((settings.duration_seconds() - 20.0).abs() < f64::EPSILON);
    }
}
