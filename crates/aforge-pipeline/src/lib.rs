//! Job orchestration and external-process supervision for AnimaForge.
//!
//! The pipeline drives two external tools per job, a 3D renderer that
//! produces PNG frames and a video encoder that assembles them into an
//! MP4, and tracks the job through an in-memory store that polling
//! clients read.
//!
//! Renderer- and encoder-specific knowledge (arguments, completion
//! markers, progress-line patterns, timeouts) lives only in the two
//! stage bundles; the runner and the orchestrator know nothing about
//! the tools they supervise.

pub mod config;
pub mod encode;
pub mod error;
pub mod orchestrator;
pub mod process;
pub mod progress;
pub mod render;
pub mod scene;
pub mod stage;
pub mod store;

pub use config::PipelineConfig;
pub use encode::EncodeStage;
pub use error::{PipelineError, PipelineResult, ProcessError, StageError, StoreError};
pub use orchestrator::Orchestrator;
pub use process::{ProcessCommand, ProcessRunner};
pub use render::RenderStage;
pub use stage::{ProgressFn, Stage, StageContext};
pub use store::JobStore;
