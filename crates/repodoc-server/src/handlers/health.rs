//! `GET /healthz`, `GET /readyz` (`SPEC_FULL.md` §6.1, grounded in the
//! teacher's `mcb-infrastructure::infrastructure::admin` `/health` handler).

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Liveness: always 200 while the process can answer HTTP requests.
pub async fn healthz() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness: 200 once the Job Manager's worker pools are up, 503 before.
pub async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.is_ready() {
        (StatusCode::OK, Json(HealthResponse { status: "ready" }))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(HealthResponse { status: "starting" }))
    }
}
