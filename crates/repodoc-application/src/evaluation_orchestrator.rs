//! Evaluation Orchestrator: clone → discovery → context → fan-out → dedup
//! → curate (`spec.md` §4.6, M2).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::AtomicU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use repodoc_domain::entities::{
    CurationOutput, EvaluationBody, EvaluationMetadata, EvaluationResult, EvaluatorResult,
    FailedEvaluator, FileEvaluations, Issue, JobRequest, UsageTotals,
};
use repodoc_domain::error::{Error, Result};
use repodoc_domain::events::{DomainEvent, IssueType};
use repodoc_domain::ports::{CloneSpec, ClonedWorkspace, EventBus, GitWorkspace, LineCounter, Provider, RetryPolicy};
use repodoc_domain::value_objects::{EvaluationMode, JobId};
use tokio_util::sync::CancellationToken;

use crate::context_analyzer::ContextAnalyzer;
use crate::curator::Curator;
use crate::deduplicator::{deduplicate, DeduplicationConfig};
use crate::evaluator_runner::{
    EvaluatorDefinition, EvaluatorOutcome, EvaluatorProgressTracker, EvaluatorRunner, EvaluatorTask,
};
use crate::file_discovery::{DiscoveredFile, FileDiscovery};

/// Tunable knobs for one evaluation run, independent of the job request's
/// per-invocation overrides.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationConfig {
    /// Curation gate threshold, per issue type (`spec.md` §4.6).
    pub curation_threshold: usize,
    /// Deduplication tuning.
    pub dedup: DeduplicationConfig,
    /// Retry policy applied to every evaluator invocation.
    pub retry_policy: RetryPolicy,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            curation_threshold: Curator::default_threshold(),
            dedup: DeduplicationConfig::default(),
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// One (file, evaluator) or cross-file evaluator outcome, tagged for
/// regrouping after the bounded fan-out completes.
struct TaskResult {
    file: Option<String>,
    evaluator_name: String,
    outcome: EvaluatorOutcome,
}

/// Drives one evaluation job end to end.
pub struct EvaluationOrchestrator {
    git_workspace: Arc<dyn GitWorkspace>,
    line_counter: Arc<dyn LineCounter>,
    event_bus: Arc<dyn EventBus>,
}

impl EvaluationOrchestrator {
    /// Build an orchestrator over its collaborator ports.
    #[must_use]
    pub fn new(
        git_workspace: Arc<dyn GitWorkspace>,
        line_counter: Arc<dyn LineCounter>,
        event_bus: Arc<dyn EventBus>,
    ) -> Self {
        Self { git_workspace, line_counter, event_bus }
    }

    /// Run the full evaluation pipeline for `request`, against the given
    /// evaluator set and provider.
    pub async fn run(
        &self,
        job_id: JobId,
        request: &JobRequest,
        evaluators: &[EvaluatorDefinition],
        provider: Arc<dyn Provider>,
        config: EvaluationConfig,
        cancellation: CancellationToken,
    ) -> Result<EvaluationResult> {
        self.event_bus.publish(job_id, DomainEvent::JobStarted { job_id }).await;

        let workspace = self.clone_repository(job_id, request, &cancellation).await?;
        let root = workspace.path().to_path_buf();

        let run_result = self
            .run_against_workspace(job_id, request, evaluators, provider, config, &root, cancellation)
            .await;

        self.git_workspace.release(workspace).await.ok();

        match &run_result {
            Ok(_) => {
                self.event_bus.publish(job_id, DomainEvent::JobCompleted { job_id, percentage: 100 }).await;
            }
            Err(err) => {
                self.event_bus
                    .publish(
                        job_id,
                        DomainEvent::JobFailed {
                            job_id,
                            message: err.to_string(),
                            code: err.category().code().to_owned(),
                            details: None,
                        },
                    )
                    .await;
            }
        }

        run_result
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_against_workspace(
        &self,
        job_id: JobId,
        request: &JobRequest,
        evaluators: &[EvaluatorDefinition],
        provider: Arc<dyn Provider>,
        config: EvaluationConfig,
        root: &std::path::Path,
        cancellation: CancellationToken,
    ) -> Result<EvaluationResult> {
        self.event_bus.publish(job_id, DomainEvent::DiscoveryStarted { job_id }).await;
        let discovery = FileDiscovery::discover(root)?;
        let target_files: Vec<DiscoveredFile> = discovery
            .files
            .into_iter()
            .filter(|f| f.is_canonical && !f.is_reference_pointer)
            .collect();
        self.event_bus
            .publish(job_id, DomainEvent::DiscoveryCompleted { job_id, files_found: target_files.len() })
            .await;

        let timeout = Duration::from_millis(request.timeout_ms);
        let context_analyzer = ContextAnalyzer::new(self.line_counter.clone(), self.event_bus.clone());
        let known_doc_paths = target_files.iter().map(|f| f.relative_path.clone()).collect();
        let project_context = context_analyzer
            .analyze(job_id, root, timeout, known_doc_paths, provider.clone(), cancellation.clone())
            .await;
        let project_context_block = format_context_block(&project_context);

        let active_evaluators = select_evaluators(evaluators, request);
        let runner = EvaluatorRunner::new(provider.clone(), self.event_bus.clone(), config.retry_policy);

        let (body, cross_file_issues, failed_evaluators) = self
            .run_evaluators(
                job_id,
                request,
                root,
                &target_files,
                &active_evaluators,
                &runner,
                timeout,
                &project_context_block,
                &cancellation,
            )
            .await;

        let mut all_issues: Vec<Issue> = match &body {
            EvaluationBody::Unified { results } => results.iter().flat_map(|r| r.issues.clone()).collect(),
            EvaluationBody::Independent { files } => files
                .values()
                .flat_map(|f| f.evaluations.iter().flat_map(|e| e.issues.clone()))
                .collect(),
        };
        all_issues.extend(cross_file_issues.iter().cloned());

        let dedup_output = deduplicate(&all_issues, config.dedup);
        let deduplicated: Vec<Issue> = dedup_output.kept.iter().map(|&i| all_issues[i].clone()).collect();

        let curator = Curator::new(provider.clone());
        let curation = self
            .curate_if_needed(job_id, &curator, &deduplicated, config.curation_threshold, root, timeout, &cancellation)
            .await;

        Ok(EvaluationResult {
            metadata: EvaluationMetadata {
                generated_at: Utc::now(),
                provider: request.provider.clone(),
                mode: request.mode,
                total_files: target_files.len(),
                project_context,
                usage: UsageTotals::default(),
                failed_evaluators,
                curation: Some(curation),
            },
            body,
            cross_file_issues,
        })
    }

    async fn clone_repository(
        &self,
        job_id: JobId,
        request: &JobRequest,
        cancellation: &CancellationToken,
    ) -> Result<ClonedWorkspace> {
        self.event_bus.publish(job_id, DomainEvent::CloneStarted { job_id }).await;
        if cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let spec = CloneSpec {
            branch: request.branch.clone(),
            commit_sha: request.commit_sha.clone(),
        };
        let workspace = GitWorkspace::clone(self.git_workspace.as_ref(), &request.repository_url, &spec)
            .await
            .map_err(|err| Error::CloneFailed { message: err.to_string() })?;
        self.event_bus
            .publish(
                job_id,
                DomainEvent::CloneCompleted {
                    job_id,
                    commit_sha: request.commit_sha.clone().unwrap_or_default(),
                },
            )
            .await;
        Ok(workspace)
    }

    /// Fan out every (evaluator, file) pair (plus cross-file evaluators run
    /// once each) bounded by `request.concurrency`, then regroup into the
    /// mode-specific body shape (`spec.md` §4.6).
    #[allow(clippy::too_many_arguments)]
    async fn run_evaluators(
        &self,
        job_id: JobId,
        request: &JobRequest,
        root: &std::path::Path,
        target_files: &[DiscoveredFile],
        evaluators: &[&EvaluatorDefinition],
        runner: &EvaluatorRunner,
        timeout: Duration,
        project_context_block: &str,
        cancellation: &CancellationToken,
    ) -> (EvaluationBody, Vec<Issue>, Vec<FailedEvaluator>) {
        for file in target_files {
            self.event_bus
                .publish(job_id, DomainEvent::FileStarted { job_id, file: file.relative_path.clone() })
                .await;
        }

        let per_file_evaluators: Vec<&EvaluatorDefinition> =
            evaluators.iter().filter(|e| !e.cross_file).copied().collect();
        let cross_file_evaluators: Vec<&EvaluatorDefinition> =
            evaluators.iter().filter(|e| e.cross_file).copied().collect();

        let concurrency = request.concurrency.max(1) as usize;

        let progress_trackers: Arc<HashMap<String, EvaluatorProgressTracker>> = Arc::new(
            per_file_evaluators
                .iter()
                .map(|e| {
                    let tracker = EvaluatorProgressTracker {
                        completed: Arc::new(AtomicU32::new(0)),
                        total: target_files.len() as u32,
                    };
                    (e.name.clone(), tracker)
                })
                .chain(cross_file_evaluators.iter().map(|e| {
                    let tracker = EvaluatorProgressTracker { completed: Arc::new(AtomicU32::new(0)), total: 1 };
                    (e.name.clone(), tracker)
                }))
                .collect(),
        );

        let per_file_futures = target_files.iter().flat_map(|file| {
            let progress_trackers = Arc::clone(&progress_trackers);
            per_file_evaluators.iter().map(move |evaluator| {
                let progress_trackers = Arc::clone(&progress_trackers);
                Box::pin(run_one(
                    runner,
                    job_id,
                    evaluator,
                    Some(file),
                    project_context_block,
                    root,
                    timeout,
                    cancellation,
                    progress_trackers,
                )) as Pin<Box<dyn Future<Output = TaskResult> + Send + '_>>
            })
        });
        let cross_file_futures = cross_file_evaluators.iter().map(|evaluator| {
            Box::pin(run_one(
                runner,
                job_id,
                evaluator,
                None,
                project_context_block,
                root,
                timeout,
                cancellation,
                Arc::clone(&progress_trackers),
            )) as Pin<Box<dyn Future<Output = TaskResult> + Send + '_>>
        });

        let results: Vec<TaskResult> = stream::iter(per_file_futures.chain(cross_file_futures))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut failed = Vec::new();
        let mut cross_file_issues = Vec::new();
        let mut per_file: HashMap<String, Vec<EvaluatorResult>> = HashMap::new();
        let mut unified_results = Vec::new();

        for task in results {
            match task.outcome {
                EvaluatorOutcome::Issues { issues, raw_response_text } => {
                    if task.file.is_none() {
                        cross_file_issues.extend(issues.clone());
                    }
                    let result = EvaluatorResult {
                        evaluator_name: task.evaluator_name,
                        file: task.file.clone(),
                        raw_response_text,
                        issues,
                    };
                    match &task.file {
                        Some(file) => per_file.entry(file.clone()).or_default().push(result),
                        None => unified_results.push(result),
                    }
                }
                EvaluatorOutcome::Failed { category, message } => failed.push(FailedEvaluator {
                    evaluator_name: task.evaluator_name,
                    file: task.file,
                    category,
                    message,
                }),
            }
        }

        let body = match request.mode {
            EvaluationMode::Unified => {
                let mut results = unified_results;
                for evaluations in per_file.into_values() {
                    results.extend(evaluations);
                }
                EvaluationBody::Unified { results }
            }
            EvaluationMode::Independent => {
                let mut files = HashMap::new();
                for file in target_files {
                    let evaluations = per_file.remove(&file.relative_path).unwrap_or_default();
                    let total_issues = evaluations.iter().map(|e| e.issues.len()).sum();
                    self.event_bus
                        .publish(
                            job_id,
                            DomainEvent::FileCompleted {
                                job_id,
                                file: file.relative_path.clone(),
                                total_issues,
                            },
                        )
                        .await;
                    files.insert(file.relative_path.clone(), FileEvaluations { evaluations, total_issues });
                }
                EvaluationBody::Independent { files }
            }
        };

        (body, cross_file_issues, failed)
    }

    async fn curate_if_needed(
        &self,
        job_id: JobId,
        curator: &Curator,
        issues: &[Issue],
        threshold: usize,
        root: &std::path::Path,
        timeout: Duration,
        cancellation: &CancellationToken,
    ) -> CurationOutput {
        let errors: Vec<Issue> = issues.iter().filter(|i| matches!(i, Issue::Error { .. })).cloned().collect();
        let suggestions: Vec<Issue> =
            issues.iter().filter(|i| matches!(i, Issue::Suggestion { .. })).cloned().collect();

        let mut output = CurationOutput::default();

        if Curator::should_curate(errors.len(), threshold) {
            self.event_bus
                .publish(job_id, DomainEvent::CurationStarted { job_id, issue_type: IssueType::Errors })
                .await;
            let block = curator.curate(&errors, threshold, root, timeout, cancellation.clone()).await;
            self.event_bus
                .publish(
                    job_id,
                    DomainEvent::CurationCompleted {
                        job_id,
                        issue_type: IssueType::Errors,
                        selected: block.curated_issues.len(),
                    },
                )
                .await;
            output.errors = Some(block);
        }
        if Curator::should_curate(suggestions.len(), threshold) {
            self.event_bus
                .publish(job_id, DomainEvent::CurationStarted { job_id, issue_type: IssueType::Suggestions })
                .await;
            let block = curator.curate(&suggestions, threshold, root, timeout, cancellation.clone()).await;
            self.event_bus
                .publish(
                    job_id,
                    DomainEvent::CurationCompleted {
                        job_id,
                        issue_type: IssueType::Suggestions,
                        selected: block.curated_issues.len(),
                    },
                )
                .await;
            output.suggestions = Some(block);
        }

        output
    }
}

#[allow(clippy::too_many_arguments)]
#[allow(clippy::too_many_arguments)]
async fn run_one(
    runner: &EvaluatorRunner,
    job_id: JobId,
    evaluator: &EvaluatorDefinition,
    file: Option<&DiscoveredFile>,
    project_context_block: &str,
    root: &std::path::Path,
    timeout: Duration,
    cancellation: &CancellationToken,
    progress_trackers: Arc<HashMap<String, EvaluatorProgressTracker>>,
) -> TaskResult {
    let progress = progress_trackers
        .get(&evaluator.name)
        .cloned()
        .unwrap_or(EvaluatorProgressTracker { completed: Arc::new(AtomicU32::new(0)), total: 1 });
    let task = EvaluatorTask {
        definition: evaluator,
        file: file.map(|f| f.relative_path.clone()),
        file_content: file.map(|f| f.content.clone()).unwrap_or_default(),
        project_context_block: project_context_block.to_owned(),
        progress,
    };
    let file_name = task.file.clone();
    let outcome = runner.run(job_id, task, root, timeout, cancellation.clone()).await;
    TaskResult { file: file_name, evaluator_name: evaluator.name.clone(), outcome }
}

fn select_evaluators<'a>(evaluators: &'a [EvaluatorDefinition], request: &JobRequest) -> Vec<&'a EvaluatorDefinition> {
    if !request.selected_evaluators.is_empty() {
        return evaluators
            .iter()
            .filter(|e| request.selected_evaluators.contains(&e.name))
            .collect();
    }
    evaluators.iter().filter(|e| e.issue_kind.matches(request.evaluator_filter)).collect()
}

fn format_context_block(context: &repodoc_domain::entities::ProjectContext) -> String {
    format!(
        "Languages: {}\nFrameworks: {}\nArchitecture: {}\nPatterns: {}\nKey folders: {}",
        context.languages,
        context.frameworks,
        context.architecture,
        context.patterns,
        context.key_folders.join(", ")
    )
}
