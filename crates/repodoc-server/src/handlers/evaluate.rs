//! `POST /api/evaluate`, `/batch`, `GET /:id`, `DELETE /:id` (`spec.md` §6).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use repodoc_domain::entities::{Job, JobRequest, JobStatus};
use repodoc_domain::value_objects::{EvaluationMode, EvaluatorFilter, JobId};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// `options` sub-object of `POST /api/evaluate` (`spec.md` §6 environment
/// inputs). `evaluators` is the scenario-table name for the allow-list;
/// `selectedEvaluators` is accepted as a synonym.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateOptions {
    #[serde(default, alias = "selectedEvaluators")]
    pub evaluators: Vec<String>,
    pub provider: Option<String>,
    pub evaluator_filter: Option<EvaluatorFilter>,
    pub timeout: Option<u64>,
    pub concurrency: Option<u32>,
    pub mode: Option<EvaluationMode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    pub repository_url: String,
    #[serde(default)]
    pub options: EvaluateOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub sse_url: String,
}

fn build_request(repository_url: String, options: EvaluateOptions, state: &AppState) -> JobRequest {
    JobRequest {
        repository_url,
        branch: None,
        commit_sha: None,
        selected_evaluators: options.evaluators,
        evaluator_filter: options.evaluator_filter.unwrap_or_default(),
        provider: options.provider.unwrap_or_else(|| state.config.default_provider.clone()),
        concurrency: options.concurrency.unwrap_or(state.config.defaults.concurrency),
        timeout_ms: options.timeout.unwrap_or(state.config.defaults.timeout_ms),
        mode: options.mode.unwrap_or_default(),
    }
}

/// `POST /api/evaluate`.
pub async fn submit_evaluation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EvaluateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let job_request = build_request(request.repository_url, request.options, &state);
    let job_id = state.job_manager.submit_evaluation(job_request)?;
    let response = EvaluateResponse { job_id, status: JobStatus::Queued, created_at: Utc::now(), sse_url: state.sse_url(job_id) };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEvaluateRequest {
    pub urls: Vec<String>,
    #[serde(default)]
    pub options: EvaluateOptions,
}

/// One submission outcome inside a batch response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchJobEntry {
    pub url: String,
    pub job_id: Option<JobId>,
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEvaluateResponse {
    pub batch_id: uuid::Uuid,
    pub total_urls: usize,
    pub jobs: Vec<BatchJobEntry>,
    pub created_at: DateTime<Utc>,
}

/// `POST /api/evaluate/batch`. Admits what fits; URLs rejected with
/// `QUEUE_FULL` are reported rather than failing the whole batch
/// (`SPEC_FULL.md` §9 batch submission semantics).
pub async fn submit_batch(State(state): State<Arc<AppState>>, Json(request): Json<BatchEvaluateRequest>) -> impl IntoResponse {
    let total_urls = request.urls.len();
    let jobs = request
        .urls
        .into_iter()
        .map(|url| {
            let job_request = build_request(url.clone(), EvaluateOptions {
                evaluators: request.options.evaluators.clone(),
                provider: request.options.provider.clone(),
                evaluator_filter: request.options.evaluator_filter,
                timeout: request.options.timeout,
                concurrency: request.options.concurrency,
                mode: request.options.mode,
            }, &state);
            match state.job_manager.submit_evaluation(job_request) {
                Ok(job_id) => BatchJobEntry { url, job_id: Some(job_id), status: "queued".to_owned() },
                Err(_) => BatchJobEntry { url, job_id: None, status: "rejected".to_owned() },
            }
        })
        .collect();

    Json(BatchEvaluateResponse { batch_id: uuid::Uuid::new_v4(), total_urls, jobs, created_at: Utc::now() })
}

/// `GET /api/evaluate/:id`.
pub async fn get_job(State(state): State<Arc<AppState>>, Path(job_id): Path<JobId>) -> Result<Json<Job>, ApiError> {
    state
        .job_manager
        .get(job_id)
        .map(Json)
        .ok_or_else(|| ApiError(repodoc_domain::error::Error::NotFound { resource: job_id.to_string() }))
}

/// `DELETE /api/evaluate/:id`. Idempotent: deleting an unknown job still
/// returns 204 (`spec.md` §6 DELETE endpoint note).
pub async fn delete_job(State(state): State<Arc<AppState>>, Path(job_id): Path<JobId>) -> StatusCode {
    state.job_manager.delete(job_id);
    StatusCode::NO_CONTENT
}
