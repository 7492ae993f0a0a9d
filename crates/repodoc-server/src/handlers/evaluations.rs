//! `GET /api/evaluations/:id`, `POST /api/evaluations/import` (`spec.md` §6).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use repodoc_domain::error::Error;
use repodoc_domain::ports::EvaluationRecord;
use repodoc_domain::value_objects::EvaluationId;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/evaluations/:id`.
pub async fn get_evaluation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<EvaluationId>,
) -> Result<Json<EvaluationRecord>, ApiError> {
    let record = state.store.load_evaluation(id).await?;
    record.map(Json).ok_or_else(|| ApiError(Error::NotFound { resource: id.to_string() }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub evaluation_id: EvaluationId,
    pub repository_url: String,
    pub status: &'static str,
}

/// `POST /api/evaluations/import`: accepts a previously-exported
/// [`EvaluationRecord`] and persists it verbatim, for restoring state from
/// an external backup (`spec.md` §6 persisted state layout).
pub async fn import_evaluation(
    State(state): State<Arc<AppState>>,
    Json(record): Json<EvaluationRecord>,
) -> Result<impl IntoResponse, ApiError> {
    let repository_url = record.repository_url.clone();
    let evaluation_id = state.store.save_evaluation(record).await?;
    Ok((StatusCode::CREATED, Json(ImportResponse { evaluation_id, repository_url, status: "imported" })))
}
