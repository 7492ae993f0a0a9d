//! Router assembly, grounded on the teacher pack's HTTP server shape at
//! `examples/5dlabs-cto/crates/healer/src/ci/server.rs` (`build_router`
//! taking `Arc<State>`, one `.route` per endpoint, `TraceLayer` +
//! `with_state`) — the teacher's own `mcb-server` crate ships no `src/` in
//! the retrieved pack, so this is the nearest real axum server in the
//! example corpus.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{evaluate, evaluations, health, remediation};
use crate::state::AppState;

/// Build the full HTTP router (`spec.md` §6, `SPEC_FULL.md` §6.1).
#[must_use]
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/api/evaluate", post(evaluate::submit_evaluation))
        .route("/api/evaluate/batch", post(evaluate::submit_batch))
        .route("/api/evaluate/{id}", get(evaluate::get_job).delete(evaluate::delete_job))
        .route("/api/evaluate/{id}/stream", get(crate::sse::stream_job))
        .route("/api/evaluations/{id}", get(evaluations::get_evaluation))
        .route("/api/evaluations/import", post(evaluations::import_evaluation))
        .route("/api/remediation/execute", post(remediation::execute_remediation))
        .route("/api/remediation/{id}", get(remediation::get_remediation).delete(remediation::delete_remediation))
        .route("/api/remediation/{id}/patch", get(remediation::get_patch))
        .route("/api/remediation/{id}/evaluate", post(remediation::reevaluate_remediation))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
