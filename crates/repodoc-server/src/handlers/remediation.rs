//! `POST /api/remediation/execute`, `GET/:id`, `GET/:id/patch`, `DELETE/:id`,
//! `POST /:id/evaluate` (`spec.md` §6).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use repodoc_domain::entities::{Issue, JobStatus};
use repodoc_domain::error::Error;
use repodoc_domain::value_objects::{EvaluationId, JobId, RemediationId, TargetAgent};
use repodoc_infrastructure::job_manager::RemediationSubmission;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub evaluation_id: EvaluationId,
    pub issues: Vec<Issue>,
    pub target_agent: TargetAgent,
    pub provider: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    pub remediation_id: JobId,
    pub sse_url: String,
    pub status: JobStatus,
}

/// `POST /api/remediation/execute`.
pub async fn execute_remediation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExecuteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(record) = state.store.load_evaluation(request.evaluation_id).await? else {
        return Err(ApiError(Error::NotFound { resource: request.evaluation_id.to_string() }));
    };

    let submission = RemediationSubmission {
        evaluation_id: request.evaluation_id,
        repository_url: Some(record.repository_url),
        local_path: None,
        branch: record.git_branch,
        commit_sha: record.git_commit_sha,
        issues: request.issues,
        target_agent: request.target_agent,
        provider: request.provider.unwrap_or_else(|| state.config.default_provider.clone()),
        timeout_ms: state.config.defaults.timeout_ms,
    };

    let job_id = state.job_manager.submit_remediation(submission)?;
    Ok((StatusCode::ACCEPTED, Json(ExecuteResponse { remediation_id: job_id, sse_url: state.sse_url(job_id), status: JobStatus::Queued })))
}

/// `GET /api/remediation/:id`: `:id` is the job id while the remediation is
/// in flight, or the persisted `RemediationRecord` id once it has completed
/// and the job entry has been deleted.
pub async fn get_remediation(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Response, ApiError> {
    if let Ok(job_id) = id.parse::<JobId>()
        && let Some(job) = state.job_manager.get(job_id)
    {
        return Ok(Json(job).into_response());
    }
    if let Ok(remediation_id) = id.parse::<RemediationId>()
        && let Some(record) = state.store.load_remediation(remediation_id).await?
    {
        return Ok(Json(record).into_response());
    }
    Err(ApiError(Error::NotFound { resource: id }))
}

/// `GET /api/remediation/:id/patch`: `text/x-patch` body, verbatim.
pub async fn get_patch(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Response, ApiError> {
    let patch = resolve_patch(&state, &id).await?;
    Ok(([(header::CONTENT_TYPE, "text/x-patch")], patch).into_response())
}

async fn resolve_patch(state: &AppState, id: &str) -> Result<String, ApiError> {
    if let Ok(job_id) = id.parse::<JobId>()
        && let Some(job) = state.job_manager.get(job_id)
        && let Some(repodoc_domain::entities::JobResult::Remediation(result)) = job.result
    {
        return Ok(result.full_patch);
    }
    if let Ok(remediation_id) = id.parse::<RemediationId>()
        && let Some(record) = state.store.load_remediation(remediation_id).await?
        && let Some(patch) = record.full_patch
    {
        return Ok(patch);
    }
    Err(ApiError(Error::NotFound { resource: id.to_owned() }))
}

/// `DELETE /api/remediation/:id`. Idempotent, like the evaluation job
/// deletion endpoint (`spec.md` §6).
pub async fn delete_remediation(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> StatusCode {
    if let Ok(job_id) = id.parse::<JobId>() {
        state.job_manager.delete(job_id);
    }
    StatusCode::NO_CONTENT
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReEvaluateResponse {
    pub job_id: JobId,
    pub sse_url: String,
    pub status: &'static str,
}

/// `POST /api/remediation/:id/evaluate`: re-run evaluation against the
/// repository a completed remediation modified. `already_exists` is
/// returned when a prior re-evaluation for this remediation already ran;
/// 409 when one is currently in flight (`spec.md` §6).
pub async fn reevaluate_remediation(
    State(state): State<Arc<AppState>>,
    Path(remediation_id): Path<RemediationId>,
) -> Result<Response, ApiError> {
    if let Some(existing) = state.post_remediation_jobs.get(&remediation_id) {
        let job_id = *existing;
        match state.job_manager.get(job_id) {
            Some(job) if !job.is_terminal() => {
                let body = crate::error::ErrorBody { code: "CONFLICT", message: format!("re-evaluation already running for remediation {remediation_id}") };
                return Ok((StatusCode::CONFLICT, Json(body)).into_response());
            }
            Some(_) => {
                return Ok((
                    StatusCode::OK,
                    Json(ReEvaluateResponse { job_id, sse_url: state.sse_url(job_id), status: "already_exists" }),
                )
                    .into_response());
            }
            None => {}
        }
    }

    let Some(record) = state.store.load_remediation(remediation_id).await? else {
        return Err(ApiError(Error::NotFound { resource: remediation_id.to_string() }));
    };
    let Some(evaluation) = state.store.load_evaluation(record.evaluation_id).await? else {
        return Err(ApiError(Error::NotFound { resource: record.evaluation_id.to_string() }));
    };

    let job_request = repodoc_domain::entities::JobRequest {
        repository_url: evaluation.repository_url,
        branch: evaluation.git_branch,
        commit_sha: evaluation.git_commit_sha,
        selected_evaluators: Vec::new(),
        evaluator_filter: repodoc_domain::value_objects::EvaluatorFilter::All,
        provider: state.config.default_provider.clone(),
        concurrency: state.config.defaults.concurrency,
        timeout_ms: state.config.defaults.timeout_ms,
        mode: repodoc_domain::value_objects::EvaluationMode::default(),
    };
    let job_id = state.job_manager.submit_evaluation(job_request)?;
    state.post_remediation_jobs.insert(remediation_id, job_id);

    Ok((StatusCode::ACCEPTED, Json(ReEvaluateResponse { job_id, sse_url: state.sse_url(job_id), status: "queued" })).into_response())
}
