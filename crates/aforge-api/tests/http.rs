//! Router-level tests driven through `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use aforge_api::{create_router, ApiConfig, AppState};
use aforge_pipeline::PipelineConfig;

fn test_state(work_root: &std::path::Path) -> AppState {
    let pipeline_config = PipelineConfig {
        work_root: work_root.to_path_buf(),
        ..PipelineConfig::default()
    };
    AppState::new(ApiConfig::default(), pipeline_config)
}

fn json_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn submit_then_poll_status() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());
    let app = create_router(state);

    let response = app
        .clone()
        .oneshot(json_request("/api/generate", r#"{"prompt": "steve walks"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = body_json(response).await;
    let job_id = body["job_id"].as_str().expect("job_id present").to_string();
    assert_eq!(body["status"], "queued");

    let response = app
        .oneshot(get_request(&format!("/api/status/{job_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["prompt"], "steve walks");
    assert!(body["progress"].is_u64());
    assert!(body["status"].is_string());
}

#[tokio::test]
async fn blank_prompt_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let app = create_router(test_state(tmp.path()));

    let response = app
        .clone()
        .oneshot(json_request("/api/generate", r#"{"prompt": ""}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(json_request("/api/generate", r#"{"prompt": "   "}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_prompt_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let app = create_router(test_state(tmp.path()));

    let long_prompt = "x".repeat(501);
    let response = app
        .oneshot(json_request(
            "/api/generate",
            &format!(r#"{{"prompt": "{long_prompt}"}}"#),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_job_status_is_404() {
    let tmp = tempfile::tempdir().unwrap();
    let app = create_router(test_state(tmp.path()));

    let response = app
        .oneshot(get_request("/api/status/no-such-job"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn download_before_done_is_a_client_error() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());
    let app = create_router(state.clone());

    // Create without starting a run, so the job stays queued.
    let job = state.store.create("steve walks").unwrap();

    let response = app
        .oneshot(get_request(&format!("/api/download/{}", job.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert!(body["detail"]
        .as_str()
        .unwrap_or_default()
        .contains("not ready"));
}

#[tokio::test]
async fn cancel_unknown_job_is_404() {
    let tmp = tempfile::tempdir().unwrap();
    let app = create_router(test_state(tmp.path()));

    let response = app
        .oneshot(json_request("/api/jobs/no-such-job/cancel", "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_settled_job_reports_nothing_in_flight() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());
    let app = create_router(state.clone());

    let job = state.store.create("steve walks").unwrap();

    let response = app
        .oneshot(json_request(&format!("/api/jobs/{}/cancel", job.id), "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["cancelled"], false);
}

#[tokio::test]
async fn health_reports_job_count() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());
    let app = create_router(state.clone());

    state.store.create("one").unwrap();
    state.store.create("two").unwrap();

    let response = app.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["jobs"], 2);
}
