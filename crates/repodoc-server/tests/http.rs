//! HTTP surface integration tests, in the teacher's `oneshot`-over-`Router`
//! style (`examples/marlonsc-mcb/tests/security.rs`).

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use repodoc_application::{EvaluationOrchestrator, RemediationOrchestrator};
use repodoc_infrastructure::config::{AppConfig, QueueConfig};
use repodoc_infrastructure::git_workspace::CliGitWorkspace;
use repodoc_infrastructure::job_manager::{JobManager, OrchestratorConfig};
use repodoc_infrastructure::line_counter::CliLineCounter;
use repodoc_infrastructure::providers::random_provider::RandomProvider;
use repodoc_infrastructure::sse_bus::SseBus;
use repodoc_infrastructure::store::InMemoryJobStore;
use repodoc_server::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_state(capacity: usize) -> Arc<AppState> {
    RandomProvider::ensure_registered();
    let event_bus: Arc<dyn repodoc_domain::ports::EventBus> = Arc::new(SseBus::default());
    let store: Arc<dyn repodoc_domain::ports::JobStore> = Arc::new(InMemoryJobStore::new());
    let manager = JobManager::spawn(
        QueueConfig { capacity, evaluation_workers: 1, remediation_workers: 1 },
        Arc::new(Vec::new()),
        Arc::new(EvaluationOrchestrator::new(Arc::new(CliGitWorkspace::new()), Arc::new(CliLineCounter::default()), event_bus.clone())),
        Arc::new(RemediationOrchestrator::new(Arc::new(CliGitWorkspace::new()), event_bus.clone())),
        OrchestratorConfig::default(),
        event_bus.clone(),
        store.clone(),
    );
    Arc::new(AppState::new(manager, store, event_bus, AppConfig::default()))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_is_always_ok() {
    let app = repodoc_server::build_router(test_state(4));
    let request = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn readyz_is_503_before_the_server_marks_itself_ready() {
    let app = repodoc_server::build_router(test_state(4));
    let request = Request::builder().uri("/readyz").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn submit_evaluation_returns_a_job_id_and_sse_url() {
    let app = repodoc_server::build_router(test_state(4));
    let payload = json!({
        "repositoryUrl": "https://example.com/acme/repo.git",
        "options": { "provider": "random", "evaluators": ["eval-A"] },
    });
    let request = Request::builder()
        .uri("/api/evaluate")
        .method(Method::POST)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert!(body["jobId"].is_string());
    assert!(body["sseUrl"].as_str().unwrap().ends_with("/stream"));
}

#[tokio::test]
async fn submit_evaluation_beyond_queue_capacity_is_429() {
    let state = test_state(1);
    let app = repodoc_server::build_router(state);
    let payload = json!({ "repositoryUrl": "https://example.com/acme/repo.git", "options": {} });

    for expected in [StatusCode::ACCEPTED, StatusCode::TOO_MANY_REQUESTS] {
        let request = Request::builder()
            .uri("/api/evaluate")
            .method(Method::POST)
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), expected);
    }
}

#[tokio::test]
async fn get_unknown_job_is_404() {
    let app = repodoc_server::build_router(test_state(4));
    let request = Request::builder().uri(format!("/api/evaluate/{}", uuid::Uuid::new_v4())).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_unknown_job_is_idempotently_204() {
    let app = repodoc_server::build_router(test_state(4));
    let request = Request::builder()
        .uri(format!("/api/evaluate/{}", uuid::Uuid::new_v4()))
        .method(Method::DELETE)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn get_unknown_evaluation_record_is_404() {
    let app = repodoc_server::build_router(test_state(4));
    let request = Request::builder().uri(format!("/api/evaluations/{}", uuid::Uuid::new_v4())).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
