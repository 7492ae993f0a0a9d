//! Job Manager: bounded per-lane queues, a fixed worker pool per lane, and
//! the `Job` lifecycle state machine (`spec.md` §4.10, `SPEC_FULL.md` H1).
//!
//! The bounded queue is a `tokio::sync::mpsc::channel(capacity)` per lane;
//! `DashMap<JobId, Job>` gives O(1) lookup/cancellation, mirroring the
//! teacher's `DefaultIndexingOperations` (`DashMap`-backed operation
//! tracker) generalized to two independent lanes instead of one.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use repodoc_application::{EvaluationConfig, EvaluationOrchestrator, RemediationConfig, RemediationOrchestrator};
use repodoc_domain::entities::{
    EvaluationResult, Issue, Job, JobError, JobKind, JobRequest, JobResult, JobStatus, LogEntry,
    RemediationResult,
};
use repodoc_domain::error::{Error, ErrorCategory, Result};
use repodoc_domain::events::DomainEvent;
use repodoc_domain::ports::job_store::{EvaluationRecord, RemediationRecord};
use repodoc_domain::ports::{EventBus, JobStore};
use repodoc_application::evaluator_runner::EvaluatorDefinition;
use repodoc_domain::registry::resolve_provider;
use repodoc_domain::value_objects::{EvaluationId, JobId, TargetAgent};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::config::QueueConfig;

/// The extra fields a remediation job needs beyond what [`JobRequest`]
/// expresses (`spec.md` `POST /api/remediation/execute` body). Kept
/// alongside the `Job` rather than folded into `JobRequest`, since most of
/// `JobRequest`'s fields (selected evaluators, evaluation mode, evaluator
/// filter) have no remediation counterpart.
#[derive(Debug, Clone)]
pub struct RemediationSubmission {
    /// The stored evaluation this remediation addresses.
    pub evaluation_id: EvaluationId,
    /// Repository URL to clone, when no local path is reused.
    pub repository_url: Option<String>,
    /// Local checkout to reuse instead of cloning.
    pub local_path: Option<PathBuf>,
    /// Branch to check out, for a fresh clone.
    pub branch: Option<String>,
    /// Commit to pin, for a fresh clone.
    pub commit_sha: Option<String>,
    /// Issues selected for remediation.
    pub issues: Vec<Issue>,
    /// Target AI-assistant convention for produced content.
    pub target_agent: TargetAgent,
    /// Name of the AI provider to invoke.
    pub provider: String,
    /// Per-provider-invocation timeout in milliseconds.
    pub timeout_ms: u64,
}

/// Configuration for the orchestrators the Job Manager drives.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrchestratorConfig {
    /// Evaluation Orchestrator tuning.
    pub evaluation: EvaluationConfig,
    /// Remediation Orchestrator tuning.
    pub remediation: RemediationConfig,
}

/// Drives the full job lifecycle across the evaluation and remediation
/// lanes: admission, FIFO dispatch to a bounded worker pool, cancellation,
/// and per-job progress/log tracking fed by the event bus.
pub struct JobManager {
    jobs: Arc<DashMap<JobId, Job>>,
    cancellations: Arc<DashMap<JobId, CancellationToken>>,
    remediation_submissions: Arc<DashMap<JobId, RemediationSubmission>>,
    evaluation_tx: mpsc::Sender<JobId>,
    remediation_tx: mpsc::Sender<JobId>,
    evaluation_capacity: usize,
    remediation_capacity: usize,
    event_bus: Arc<dyn EventBus>,
    store: Arc<dyn JobStore>,
}

impl JobManager {
    /// Build the Job Manager and spawn its worker pools.
    #[must_use]
    pub fn spawn(
        queues: QueueConfig,
        evaluators: Arc<Vec<EvaluatorDefinition>>,
        evaluation_orchestrator: Arc<EvaluationOrchestrator>,
        remediation_orchestrator: Arc<RemediationOrchestrator>,
        orchestrator_config: OrchestratorConfig,
        event_bus: Arc<dyn EventBus>,
        store: Arc<dyn JobStore>,
    ) -> Arc<Self> {
        let jobs = Arc::new(DashMap::new());
        let cancellations = Arc::new(DashMap::new());
        let remediation_submissions = Arc::new(DashMap::new());

        let (evaluation_tx, evaluation_rx) = mpsc::channel::<JobId>(queues.capacity);
        let (remediation_tx, remediation_rx) = mpsc::channel::<JobId>(queues.capacity);

        let manager = Arc::new(Self {
            jobs,
            cancellations,
            remediation_submissions,
            evaluation_tx,
            remediation_tx,
            evaluation_capacity: queues.capacity,
            remediation_capacity: queues.capacity,
            event_bus,
            store,
        });

        spawn_evaluation_workers(
            manager.clone(),
            evaluation_rx,
            queues.evaluation_workers,
            evaluators,
            evaluation_orchestrator,
            orchestrator_config.evaluation,
        );
        spawn_remediation_workers(
            manager.clone(),
            remediation_rx,
            queues.remediation_workers,
            remediation_orchestrator,
            orchestrator_config.remediation,
        );

        manager
    }

    /// Admit an evaluation job. Rejects with [`Error::QueueFull`] once the
    /// evaluation lane's queue is at capacity.
    pub fn submit_evaluation(&self, request: JobRequest) -> Result<JobId> {
        let job = Job::new(JobKind::Evaluation, request);
        let job_id = job.id;
        self.jobs.insert(job_id, job);
        self.cancellations.insert(job_id, CancellationToken::new());

        self.evaluation_tx.try_send(job_id).map_err(|_| {
            self.jobs.remove(&job_id);
            self.cancellations.remove(&job_id);
            Error::QueueFull { capacity: self.evaluation_capacity }
        })?;
        Ok(job_id)
    }

    /// Admit a remediation job. Rejects with [`Error::QueueFull`] once the
    /// remediation lane's queue is at capacity.
    pub fn submit_remediation(&self, submission: RemediationSubmission) -> Result<JobId> {
        let request = JobRequest {
            repository_url: submission.repository_url.clone().unwrap_or_default(),
            branch: submission.branch.clone(),
            commit_sha: submission.commit_sha.clone(),
            selected_evaluators: Vec::new(),
            evaluator_filter: repodoc_domain::value_objects::EvaluatorFilter::All,
            provider: submission.provider.clone(),
            concurrency: 1,
            timeout_ms: submission.timeout_ms,
            mode: repodoc_domain::value_objects::EvaluationMode::Independent,
        };
        let job = Job::new(JobKind::Remediation, request);
        let job_id = job.id;
        self.jobs.insert(job_id, job);
        self.cancellations.insert(job_id, CancellationToken::new());
        self.remediation_submissions.insert(job_id, submission);

        self.remediation_tx.try_send(job_id).map_err(|_| {
            self.jobs.remove(&job_id);
            self.cancellations.remove(&job_id);
            self.remediation_submissions.remove(&job_id);
            Error::QueueFull { capacity: self.remediation_capacity }
        })?;
        Ok(job_id)
    }

    /// Look up a job's current state.
    #[must_use]
    pub fn get(&self, job_id: JobId) -> Option<Job> {
        self.jobs.get(&job_id).map(|entry| entry.clone())
    }

    /// Cancel a job in flight. A queued job is marked cancelled immediately;
    /// a running job's cancellation token is signalled and honored by the
    /// orchestrator within its grace period (`spec.md` §4.10).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no such job exists, and is a no-op
    /// (not an error) when the job already reached a terminal state.
    pub fn cancel(&self, job_id: JobId) -> Result<()> {
        let mut entry = self.jobs.get_mut(&job_id).ok_or_else(|| Error::NotFound { resource: job_id.to_string() })?;
        if entry.is_terminal() {
            return Ok(());
        }
        if let Some(token) = self.cancellations.get(&job_id) {
            token.cancel();
        }
        entry.status = JobStatus::Cancelled;
        entry.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Remove a terminal job's record. Idempotent: removing an unknown or
    /// already-removed job is not an error (`spec.md` §6 `DELETE` endpoints).
    pub fn delete(&self, job_id: JobId) {
        self.jobs.remove(&job_id);
        self.cancellations.remove(&job_id);
        self.remediation_submissions.remove(&job_id);
    }
}

fn spawn_evaluation_workers(
    manager: Arc<JobManager>,
    receiver: mpsc::Receiver<JobId>,
    worker_count: usize,
    evaluators: Arc<Vec<EvaluatorDefinition>>,
    orchestrator: Arc<EvaluationOrchestrator>,
    config: EvaluationConfig,
) {
    let receiver = Arc::new(Mutex::new(receiver));
    for _ in 0..worker_count.max(1) {
        let manager = manager.clone();
        let receiver = receiver.clone();
        let evaluators = evaluators.clone();
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            loop {
                let job_id = { receiver.lock().await.recv().await };
                let Some(job_id) = job_id else { break };
                run_evaluation_job(manager.clone(), job_id, evaluators.clone(), orchestrator.clone(), config).await;
            }
        });
    }
}

fn spawn_remediation_workers(
    manager: Arc<JobManager>,
    receiver: mpsc::Receiver<JobId>,
    worker_count: usize,
    orchestrator: Arc<RemediationOrchestrator>,
    config: RemediationConfig,
) {
    let receiver = Arc::new(Mutex::new(receiver));
    for _ in 0..worker_count.max(1) {
        let manager = manager.clone();
        let receiver = receiver.clone();
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            loop {
                let job_id = { receiver.lock().await.recv().await };
                let Some(job_id) = job_id else { break };
                run_remediation_job(&manager, job_id, &orchestrator, config).await;
            }
        });
    }
}

async fn run_evaluation_job(
    manager: Arc<JobManager>,
    job_id: JobId,
    evaluators: Arc<Vec<EvaluatorDefinition>>,
    orchestrator: Arc<EvaluationOrchestrator>,
    config: EvaluationConfig,
) {
    let Some(request) = mark_running(&manager, job_id) else { return };
    let cancellation = manager.cancellations.get(&job_id).map(|t| t.clone()).unwrap_or_default();
    let progress_task = spawn_progress_tracker(manager.clone(), manager.event_bus.clone(), job_id);

    let provider = match resolve_provider(&request.provider) {
        Ok(provider) => provider,
        Err(err) => {
            finish_with_error(&manager, job_id, &err);
            progress_task.abort();
            return;
        }
    };

    let outcome = orchestrator.run(job_id, &request, &evaluators, provider, config, cancellation).await;
    progress_task.abort();
    finish_evaluation(&manager, job_id, outcome).await;
}

async fn run_remediation_job(
    manager: &Arc<JobManager>,
    job_id: JobId,
    orchestrator: &Arc<RemediationOrchestrator>,
    config: RemediationConfig,
) {
    let Some(submission) = manager.remediation_submissions.get(&job_id).map(|entry| entry.clone()) else {
        finish_with_error(
            manager,
            job_id,
            &Error::Internal { message: "remediation submission missing for admitted job".to_owned() },
        );
        return;
    };
    if mark_running(manager, job_id).is_none() {
        return;
    }

    let cancellation = manager.cancellations.get(&job_id).map(|t| t.clone()).unwrap_or_default();
    let progress_task = spawn_progress_tracker(manager.clone(), manager.event_bus.clone(), job_id);

    let provider = match resolve_provider(&submission.provider) {
        Ok(provider) => provider,
        Err(err) => {
            finish_with_error(manager, job_id, &err);
            progress_task.abort();
            return;
        }
    };

    let request = repodoc_application::remediation_orchestrator::RemediationRequest {
        repository_url: submission.repository_url.clone(),
        local_path: submission.local_path.clone(),
        branch: submission.branch.clone(),
        commit_sha: submission.commit_sha.clone(),
        issues: submission.issues.clone(),
        target_agent: submission.target_agent,
        timeout: Duration::from_millis(submission.timeout_ms),
    };

    let outcome = orchestrator.run(job_id, request, provider, config, cancellation).await;
    progress_task.abort();
    finish_remediation(manager, job_id, outcome).await;
}

fn mark_running(manager: &Arc<JobManager>, job_id: JobId) -> Option<JobRequest> {
    let mut entry = manager.jobs.get_mut(&job_id)?;
    if entry.status == JobStatus::Cancelled {
        return None;
    }
    entry.status = JobStatus::Running;
    entry.started_at = Some(Utc::now());
    Some(entry.request.clone())
}

async fn finish_evaluation(manager: &Arc<JobManager>, job_id: JobId, outcome: Result<EvaluationResult>) {
    let persist = {
        let Some(mut entry) = manager.jobs.get_mut(&job_id) else { return };
        entry.completed_at = Some(Utc::now());
        match outcome {
            Ok(result) => {
                entry.status = JobStatus::Completed;
                let record = EvaluationRecord {
                    id: EvaluationId::new(),
                    repository_url: entry.request.repository_url.clone(),
                    git_branch: entry.request.branch.clone(),
                    git_commit_sha: entry.request.commit_sha.clone(),
                    created_at: Utc::now(),
                    cost_usd: result.metadata.usage.total_cost_usd,
                    duration_ms: result.metadata.usage.total_duration_ms,
                    result: result.clone(),
                };
                entry.result = Some(JobResult::Evaluation(Box::new(result)));
                Some(record)
            }
            Err(err) => {
                entry.status = JobStatus::Failed;
                entry.error = Some(JobError::new(err.category(), err.to_string()));
                None
            }
        }
    };
    if let Some(record) = persist {
        let _ = manager.store.save_evaluation(record).await;
    }
}

async fn finish_remediation(manager: &Arc<JobManager>, job_id: JobId, outcome: Result<RemediationResult>) {
    let evaluation_id = manager.remediation_submissions.get(&job_id).map(|entry| entry.evaluation_id);
    let persist = {
        let Some(mut entry) = manager.jobs.get_mut(&job_id) else { return };
        entry.completed_at = Some(Utc::now());
        match outcome {
            Ok(result) => {
                entry.status = JobStatus::Completed;
                let record = RemediationRecord {
                    id: repodoc_domain::value_objects::RemediationId::new(),
                    evaluation_id: evaluation_id.unwrap_or_else(EvaluationId::new),
                    created_at: Utc::now(),
                    status: "completed".to_owned(),
                    total_additions: result.total_additions,
                    total_deletions: result.total_deletions,
                    full_patch: Some(result.full_patch.clone()),
                    file_changes: Some(result.file_changes.clone()),
                    summary: None,
                    phase_stats: Some(result.phase_stats.clone()),
                };
                entry.result = Some(JobResult::Remediation(Box::new(result)));
                Some(record)
            }
            Err(err) => {
                entry.status = JobStatus::Failed;
                entry.error = Some(JobError::new(err.category(), err.to_string()));
                None
            }
        }
    };
    if let Some(record) = persist {
        let _ = manager.store.save_remediation(record).await;
    }
}

fn finish_with_error(manager: &Arc<JobManager>, job_id: JobId, err: &Error) {
    if let Some(mut entry) = manager.jobs.get_mut(&job_id) {
        entry.status = JobStatus::Failed;
        entry.completed_at = Some(Utc::now());
        entry.error = Some(JobError::new(err.category(), err.to_string()));
    }
}

/// Subscribe to `job_id`'s event stream and fold each event into the job's
/// progress snapshot and log ring, until the stream closes at the terminal
/// event (or the caller aborts it, e.g. on early admission failure).
fn spawn_progress_tracker(
    manager: Arc<JobManager>,
    event_bus: Arc<dyn EventBus>,
    job_id: JobId,
) -> tokio::task::JoinHandle<()> {
    use futures::StreamExt;

    tokio::spawn(async move {
        let mut stream = event_bus.subscribe(job_id);
        while let Some(event) = stream.next().await {
            let Some(mut entry) = manager.jobs.get_mut(&job_id) else { break };
            entry.log.push(LogEntry { timestamp: Utc::now(), level: "info".to_owned(), message: event.wire_name().to_owned() });
            apply_progress(&mut entry.progress, &event);
        }
    })
}

fn apply_progress(progress: &mut repodoc_domain::entities::ProgressSnapshot, event: &DomainEvent) {
    match event {
        DomainEvent::DiscoveryCompleted { files_found, .. } => {
            progress.total_files = u32::try_from(*files_found).unwrap_or(u32::MAX);
        }
        DomainEvent::FileStarted { file, .. } => {
            progress.current_file = Some(file.clone());
        }
        DomainEvent::FileCompleted { .. } => {
            progress.completed_files += 1;
        }
        DomainEvent::EvaluatorProgress { evaluator_name, completed, total, .. } => {
            progress.current_evaluator = Some(evaluator_name.clone());
            progress.completed_evaluators = *completed;
            progress.total_evaluators = *total;
        }
        _ => {}
    }
}

/// Classify a failure category without constructing a full [`Error`], for
/// callers (the HTTP layer) that only have the stored [`JobError`] code.
#[must_use]
pub fn category_from_code(code: &str) -> ErrorCategory {
    match code {
        "TIMEOUT" => ErrorCategory::Timeout,
        "PARSE_ERROR" => ErrorCategory::Parsing,
        "FS_ERROR" => ErrorCategory::FileSystem,
        "PROVIDER_ERROR" => ErrorCategory::Provider,
        "REPO_ERROR" => ErrorCategory::Repository,
        "QUEUE_FULL" => ErrorCategory::Queue,
        "NOT_FOUND" => ErrorCategory::NotFound,
        "INVALID_REQUEST" => ErrorCategory::Invalid,
        "CANCELLED" => ErrorCategory::Cancelled,
        _ => ErrorCategory::Internal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::random_provider::RandomProvider;
    use crate::sse_bus::SseBus;

    fn request() -> JobRequest {
        JobRequest {
            repository_url: "https://example.com/acme/repo.git".to_owned(),
            branch: None,
            commit_sha: None,
            selected_evaluators: Vec::new(),
            evaluator_filter: repodoc_domain::value_objects::EvaluatorFilter::All,
            provider: "random".to_owned(),
            concurrency: 2,
            timeout_ms: 5_000,
            mode: repodoc_domain::value_objects::EvaluationMode::Independent,
        }
    }

    fn register_random_provider_once() {
        RandomProvider::ensure_registered();
    }

    #[test]
    fn category_from_code_round_trips_known_codes() {
        assert_eq!(category_from_code("QUEUE_FULL"), ErrorCategory::Queue);
        assert_eq!(category_from_code("ABANDONED"), ErrorCategory::Internal);
    }

    #[tokio::test]
    async fn submit_evaluation_beyond_capacity_is_rejected() {
        register_random_provider_once();
        let event_bus: Arc<dyn EventBus> = Arc::new(SseBus::default());
        let manager = JobManager::spawn(
            QueueConfig { capacity: 1, evaluation_workers: 0, remediation_workers: 0 },
            Arc::new(Vec::new()),
            Arc::new(EvaluationOrchestrator::new(
                Arc::new(crate::git_workspace::CliGitWorkspace::new()),
                Arc::new(crate::line_counter::CliLineCounter::default()),
                event_bus.clone(),
            )),
            Arc::new(RemediationOrchestrator::new(
                Arc::new(crate::git_workspace::CliGitWorkspace::new()),
                event_bus.clone(),
            )),
            OrchestratorConfig::default(),
            event_bus,
            Arc::new(crate::store::InMemoryJobStore::new()),
        );

        manager.submit_evaluation(request()).expect("first job admitted");
        let second = manager.submit_evaluation(request());
        assert!(matches!(second, Err(Error::QueueFull { capacity: 1 })));
    }

    #[tokio::test]
    async fn cancel_unknown_job_is_not_found() {
        let event_bus: Arc<dyn EventBus> = Arc::new(SseBus::default());
        let manager = JobManager::spawn(
            QueueConfig { capacity: 1, evaluation_workers: 0, remediation_workers: 0 },
            Arc::new(Vec::new()),
            Arc::new(EvaluationOrchestrator::new(
                Arc::new(crate::git_workspace::CliGitWorkspace::new()),
                Arc::new(crate::line_counter::CliLineCounter::default()),
                event_bus.clone(),
            )),
            Arc::new(RemediationOrchestrator::new(
                Arc::new(crate::git_workspace::CliGitWorkspace::new()),
                event_bus.clone(),
            )),
            OrchestratorConfig::default(),
            event_bus,
            Arc::new(crate::store::InMemoryJobStore::new()),
        );
        assert!(manager.cancel(JobId::new()).is_err());
    }
}
