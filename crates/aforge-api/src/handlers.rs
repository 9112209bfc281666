//! Request handlers.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use aforge_models::{JobId, JobState};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Animation submission request.
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateRequest {
    #[validate(length(
        min = 1,
        max = 500,
        message = "Prompt must be between 1 and 500 characters"
    ))]
    pub prompt: String,
}

#[derive(Serialize)]
pub struct GenerateResponse {
    pub job_id: String,
    pub status: JobState,
    pub message: String,
}

/// Submit an animation job. Returns as soon as the run is launched.
pub async fn generate(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<(StatusCode, Json<GenerateResponse>)> {
    req.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let prompt = req.prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::bad_request("Prompt is required"));
    }

    let job = state.store.create(prompt)?;
    info!(job_id = %job.id, "Accepted animation request");
    state.orchestrator.start(job.id.clone());

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateResponse {
            job_id: job.id.to_string(),
            status: job.state,
            message: "Animation generation started".to_string(),
        }),
    ))
}

/// Polling projection of a job record.
#[derive(Serialize)]
pub struct StatusResponse {
    pub status: JobState,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_frames: Option<u32>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub prompt: String,
}

/// Poll job status. Read-only.
pub async fn status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let job = state
        .store
        .get(&JobId::from_string(&job_id))
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    Ok(Json(StatusResponse {
        status: job.state,
        progress: job.progress,
        frame: job.current_frame,
        total_frames: job.total_frames,
        error: job.error_detail,
        created_at: job.created_at,
        updated_at: job.updated_at,
        prompt: job.prompt,
    }))
}

/// Download the finished video.
///
/// A job that has not reached `done` is a client error, not a missing
/// file.
pub async fn download(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let job = state
        .store
        .get(&JobId::from_string(&job_id))
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    if job.state != JobState::Done {
        return Err(ApiError::bad_request(format!(
            "Animation not ready yet (status: {})",
            job.state
        )));
    }

    let artifact = job
        .artifact_path
        .ok_or_else(|| ApiError::internal("Finished job has no artifact path"))?;

    let bytes = tokio::fs::read(&artifact)
        .await
        .map_err(|_| ApiError::not_found("Video file not available"))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_LENGTH, bytes.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"animation-{job_id}.mp4\""),
        )
        .header(header::CACHE_CONTROL, "public, max-age=3600")
        .header(header::ACCEPT_RANGES, "bytes")
        .body(Body::from(bytes))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {e}")))
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub job_id: String,
    pub cancelled: bool,
}

/// Cancel a running job. `cancelled: false` means no run was in flight
/// (the job already settled).
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    let id = JobId::from_string(&job_id);
    if state.store.get(&id).is_none() {
        return Err(ApiError::not_found("Job not found"));
    }

    let cancelled = state.orchestrator.cancel(&id);
    Ok(Json(CancelResponse {
        job_id,
        cancelled,
    }))
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub jobs: usize,
}

/// Liveness probe.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        jobs: state.store.len(),
    })
}
