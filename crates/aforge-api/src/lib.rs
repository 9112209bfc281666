//! Axum HTTP API for AnimaForge.
//!
//! Thin collaborator over the pipeline crate: submission creates a job
//! and starts its run, status polls the job store, download streams the
//! finished artifact. No pipeline state lives here.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
