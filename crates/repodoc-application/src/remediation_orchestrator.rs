//! Remediation Orchestrator: resolve workspace → consolidate → plan/execute
//! errors then suggestions → capture diff → reset (`spec.md` §4.7, M3).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use repodoc_domain::entities::{
    ActionOutputType, ActionStatus, ActionSummary, FileLocation, Issue, Location, PhaseStats,
    PhaseStatsBlock, RemediationResult, MERGE_DELIMITER,
};
use repodoc_domain::error::{Error, Result};
use repodoc_domain::events::{DomainEvent, RemediationStep};
use repodoc_domain::ports::{
    CloneSpec, ClonedWorkspace, EventBus, GitWorkspace, InvokeOptions, Provider,
};
use repodoc_domain::value_objects::{JobId, TargetAgent};
use tokio_util::sync::CancellationToken;

use crate::constants::DEFAULT_BATCH_SIZE;
use crate::diff_parser::parse_unified_diff;
use crate::file_discovery::FileDiscovery;
use crate::json_block::extract_json_object;

const TOTAL_PHASES: u32 = 4;
const AI_MERGE_MIN_RATIO: f64 = 0.2;

/// Tunable knobs for one remediation run.
#[derive(Debug, Clone, Copy)]
pub struct RemediationConfig {
    /// Issues per execute-phase batch (`spec.md` §4.7 batching note).
    pub batch_size: usize,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self { batch_size: DEFAULT_BATCH_SIZE }
    }
}

/// Everything the orchestrator needs beyond the evaluation itself: where the
/// repository lives, which issues were selected, and the output convention.
pub struct RemediationRequest {
    /// Clone a fresh workspace from this URL, when present.
    pub repository_url: Option<String>,
    /// Reuse this already-checked-out path when `repository_url` is absent.
    pub local_path: Option<PathBuf>,
    /// Branch to check out, for a fresh clone.
    pub branch: Option<String>,
    /// Commit to pin, for a fresh clone.
    pub commit_sha: Option<String>,
    /// The issues selected for remediation, errors and suggestions mixed.
    pub issues: Vec<Issue>,
    /// Target AI-assistant convention for produced content.
    pub target_agent: TargetAgent,
    /// Per-provider-invocation timeout.
    pub timeout: Duration,
}

/// Drives one remediation job end to end.
pub struct RemediationOrchestrator {
    git_workspace: Arc<dyn GitWorkspace>,
    event_bus: Arc<dyn EventBus>,
}

struct Totals {
    duration_ms: u64,
    cost_usd: f64,
    tokens: u64,
    completed_phases: u32,
}

impl RemediationOrchestrator {
    /// Build an orchestrator over its collaborator ports.
    #[must_use]
    pub fn new(git_workspace: Arc<dyn GitWorkspace>, event_bus: Arc<dyn EventBus>) -> Self {
        Self { git_workspace, event_bus }
    }

    /// Run the full plan/execute pipeline for `request`.
    pub async fn run(
        &self,
        job_id: JobId,
        request: RemediationRequest,
        provider: Arc<dyn Provider>,
        config: RemediationConfig,
        cancellation: CancellationToken,
    ) -> Result<RemediationResult> {
        let (root, owned) = self.resolve_workspace(job_id, &request, &cancellation).await?;
        let outcome = self.run_against_workspace(job_id, &request, &root, owned, provider, config, &cancellation).await;

        self.step(job_id, RemediationStep::Resetting, true).await;
        self.git_workspace.reset(&root).await.ok();
        if owned {
            self.git_workspace.release(ClonedWorkspace::new(root)).await.ok();
        }
        self.step(job_id, RemediationStep::Resetting, false).await;

        outcome
    }

    async fn resolve_workspace(
        &self,
        job_id: JobId,
        request: &RemediationRequest,
        cancellation: &CancellationToken,
    ) -> Result<(PathBuf, bool)> {
        if let Some(url) = &request.repository_url {
            self.step(job_id, RemediationStep::Cloning, true).await;
            if cancellation.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let spec = CloneSpec { branch: request.branch.clone(), commit_sha: request.commit_sha.clone() };
            let workspace = GitWorkspace::clone(self.git_workspace.as_ref(), url, &spec)
                .await
                .map_err(|err| Error::CloneFailed { message: err.to_string() })?;
            self.step(job_id, RemediationStep::Cloning, false).await;
            return Ok((workspace.path().to_path_buf(), true));
        }

        let path = request
            .local_path
            .clone()
            .ok_or_else(|| Error::InvalidRequest { message: "remediation request has neither a repository URL nor a local path".to_owned() })?;

        self.step(job_id, RemediationStep::CheckingGit, true).await;
        let clean = self.git_workspace.is_clean(&path).await?;
        self.step(job_id, RemediationStep::CheckingGit, false).await;
        if !clean {
            return Err(Error::InvalidRequest { message: "working tree is not clean".to_owned() });
        }
        Ok((path, false))
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_against_workspace(
        &self,
        job_id: JobId,
        request: &RemediationRequest,
        root: &Path,
        _owned: bool,
        provider: Arc<dyn Provider>,
        config: RemediationConfig,
        cancellation: &CancellationToken,
    ) -> Result<RemediationResult> {
        self.step(job_id, RemediationStep::ConsolidatingFiles, true).await;
        let mut issues = request.issues.clone();
        consolidate_colocated_pairs(root, &provider, request.timeout, cancellation, &mut issues).await?;
        self.step(job_id, RemediationStep::ConsolidatingFiles, false).await;

        let mut errors: Vec<Issue> = issues.iter().filter(|i| matches!(i, Issue::Error { .. })).cloned().collect();
        errors.sort_by(|a, b| severity_of(b).cmp(&severity_of(a)));
        let mut suggestions: Vec<Issue> =
            issues.iter().filter(|i| matches!(i, Issue::Suggestion { .. })).cloned().collect();
        suggestions.sort_by_key(|i| std::cmp::Reverse(impact_weight(i)));

        let mut totals = Totals { duration_ms: 0, cost_usd: 0.0, tokens: 0, completed_phases: 0 };

        self.step(job_id, RemediationStep::PlanningErrorFix, true).await;
        let (error_plan_text, error_plan_stats) =
            plan_phase(&provider, &errors, root, request.timeout, cancellation.clone(), "error fixes").await?;
        self.publish_progress(job_id, &mut totals, &error_plan_stats).await;
        self.step(job_id, RemediationStep::PlanningErrorFix, false).await;

        self.step(job_id, RemediationStep::ExecutingErrorFix, true).await;
        let (error_actions, error_execute_stats) = self
            .run_execute_phase(
                job_id,
                &provider,
                &errors,
                &error_plan_text,
                root,
                request.timeout,
                cancellation,
                config.batch_size,
                request.target_agent,
                &mut totals,
            )
            .await?;
        self.step(job_id, RemediationStep::ExecutingErrorFix, false).await;

        self.step(job_id, RemediationStep::CapturingErrorDiff, true).await;
        let error_fix_diff = self.git_workspace.capture_diff(root).await?;
        self.step(job_id, RemediationStep::CapturingErrorDiff, false).await;

        let error_summary_bullets = build_bullet_summary(&error_actions);

        self.step(job_id, RemediationStep::PlanningSuggestionEnrich, true).await;
        let (suggestion_plan_text, suggestion_plan_stats) = plan_phase(
            &provider,
            &suggestions,
            root,
            request.timeout,
            cancellation.clone(),
            &format!("suggestion enrichment. Error fixes already applied:\n{error_summary_bullets}"),
        )
        .await?;
        self.publish_progress(job_id, &mut totals, &suggestion_plan_stats).await;
        self.step(job_id, RemediationStep::PlanningSuggestionEnrich, false).await;

        self.step(job_id, RemediationStep::ExecutingSuggestionEnrich, true).await;
        let (suggestion_actions, suggestion_execute_stats) = self
            .run_execute_phase(
                job_id,
                &provider,
                &suggestions,
                &suggestion_plan_text,
                root,
                request.timeout,
                cancellation,
                config.batch_size,
                request.target_agent,
                &mut totals,
            )
            .await?;
        self.step(job_id, RemediationStep::ExecutingSuggestionEnrich, false).await;

        self.step(job_id, RemediationStep::CapturingDiff, true).await;
        let full_patch = self.git_workspace.capture_diff(root).await?;
        self.step(job_id, RemediationStep::CapturingDiff, false).await;

        let parsed = parse_unified_diff(&full_patch);
        let file_changes = parsed
            .files
            .iter()
            .map(|f| repodoc_domain::entities::FileChange {
                path: f.path.clone(),
                status: f.status,
                additions: f.additions,
                deletions: f.deletions,
                patch: f.patch.clone(),
            })
            .collect::<Vec<_>>();

        let mut action_summary = error_actions;
        action_summary.extend(suggestion_actions);

        Ok(RemediationResult {
            full_patch,
            total_additions: parsed.total_additions(),
            total_deletions: parsed.total_deletions(),
            file_changes,
            phase_stats: PhaseStatsBlock {
                error_plan: Some(error_plan_stats),
                error_execute: Some(error_execute_stats),
                suggestion_plan: Some(suggestion_plan_stats),
                suggestion_execute: Some(suggestion_execute_stats),
            },
            action_summary,
            error_fix_diff,
            error_plan_text,
            suggestion_plan_text,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_execute_phase(
        &self,
        job_id: JobId,
        provider: &Arc<dyn Provider>,
        issues: &[Issue],
        plan_text: &str,
        cwd: &Path,
        timeout: Duration,
        cancellation: &CancellationToken,
        batch_size: usize,
        target_agent: TargetAgent,
        totals: &mut Totals,
    ) -> Result<(Vec<ActionSummary>, PhaseStats)> {
        let mut actions = Vec::new();
        let mut prompt_texts = Vec::new();
        let mut duration_ms = 0u64;
        let mut cost_usd = 0.0;
        let mut tokens = 0u64;

        let batches: Vec<&[Issue]> = if issues.is_empty() {
            Vec::new()
        } else {
            issues.chunks(batch_size.max(1)).collect()
        };

        for (batch_index, batch) in batches.iter().enumerate() {
            let prompt = build_execute_prompt(plan_text, batch, target_agent);
            let options = InvokeOptions { cwd: cwd.to_path_buf(), write_mode: true, timeout, cancellation: cancellation.clone() };
            let response = provider.invoke(&prompt, &options).await?;

            duration_ms += response.duration_ms;
            cost_usd += response.cost_usd;
            tokens += response.usage.total();
            totals.duration_ms += response.duration_ms;
            totals.cost_usd += response.cost_usd;
            totals.tokens += response.usage.total();
            self.event_bus
                .publish(
                    job_id,
                    DomainEvent::RemediationProgress {
                        job_id,
                        duration_ms: totals.duration_ms,
                        cost_usd: totals.cost_usd,
                        tokens: totals.tokens,
                        completed_phases: totals.completed_phases,
                        total_phases: TOTAL_PHASES,
                    },
                )
                .await;

            let offset = batch_index * batch_size;
            actions.extend(parse_actions(&response.result_text, offset));
            prompt_texts.push(prompt);
        }

        totals.completed_phases += 1;
        Ok((
            actions,
            PhaseStats { prompt_text: prompt_texts.join("\n---\n"), duration_ms, cost_usd, tokens },
        ))
    }

    async fn publish_progress(&self, job_id: JobId, totals: &mut Totals, stats: &PhaseStats) {
        totals.duration_ms += stats.duration_ms;
        totals.cost_usd += stats.cost_usd;
        totals.tokens += stats.tokens;
        totals.completed_phases += 1;
        self.event_bus
            .publish(
                job_id,
                DomainEvent::RemediationProgress {
                    job_id,
                    duration_ms: totals.duration_ms,
                    cost_usd: totals.cost_usd,
                    tokens: totals.tokens,
                    completed_phases: totals.completed_phases,
                    total_phases: TOTAL_PHASES,
                },
            )
            .await;
    }

    async fn step(&self, job_id: JobId, step: RemediationStep, started: bool) {
        let event = if started {
            DomainEvent::RemediationStepStarted { job_id, step }
        } else {
            DomainEvent::RemediationStepCompleted { job_id, step }
        };
        self.event_bus.publish(job_id, event).await;
    }
}

async fn plan_phase(
    provider: &Arc<dyn Provider>,
    issues: &[Issue],
    cwd: &Path,
    timeout: Duration,
    cancellation: CancellationToken,
    context_label: &str,
) -> Result<(String, PhaseStats)> {
    if issues.is_empty() {
        return Ok((String::new(), PhaseStats::default()));
    }
    let prompt = build_plan_prompt(issues, context_label);
    let options = InvokeOptions { cwd: cwd.to_path_buf(), write_mode: false, timeout, cancellation };
    let response = provider.invoke(&prompt, &options).await?;
    Ok((
        response.result_text.clone(),
        PhaseStats {
            prompt_text: prompt,
            duration_ms: response.duration_ms,
            cost_usd: response.cost_usd,
            tokens: response.usage.total(),
        },
    ))
}

fn build_plan_prompt(issues: &[Issue], context_label: &str) -> String {
    let mut prompt = format!("Plan {context_label} for the following issues. Do not modify any files yet.\n\n");
    for (i, issue) in issues.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, issue.common().primary_text()));
    }
    prompt
}

fn build_execute_prompt(plan_text: &str, batch: &[Issue], target_agent: TargetAgent) -> String {
    let mut prompt = format!(
        "Execute the following plan, mutating files as needed. Write documentation in the {} convention:\n{plan_text}\n\nIssues in this batch:\n",
        target_agent_label(target_agent)
    );
    for (i, issue) in batch.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, issue.common().primary_text()));
    }
    prompt.push_str(
        "\nRespond with JSON: {\"actions\": [{\"issueIndex\": <0-indexed>, \"status\": \"fixed\"|\"added\"|\"skipped\", \"file\": \"...\", \"outputType\": \"standard\"|\"skill\"|\"generic\", \"summary\": \"...\"}]}.",
    );
    prompt
}

fn target_agent_label(target_agent: TargetAgent) -> &'static str {
    match target_agent {
        TargetAgent::AgentsMd => "AGENTS.md",
        TargetAgent::ClaudeCode => "Claude Code (CLAUDE.md)",
        TargetAgent::GithubCopilot => "GitHub Copilot instructions",
        TargetAgent::Cursor => "Cursor rules",
    }
}

fn build_bullet_summary(actions: &[ActionSummary]) -> String {
    actions.iter().map(|a| format!("- {}", a.short_summary)).collect::<Vec<_>>().join("\n")
}

fn parse_actions(text: &str, batch_offset: usize) -> Vec<ActionSummary> {
    let Some(value) = extract_json_object(text, "actions") else {
        return Vec::new();
    };
    let Some(raw_actions) = value.get("actions").and_then(|v| v.as_array()) else {
        return Vec::new();
    };

    raw_actions
        .iter()
        .map(|raw| {
            let local_index = raw.get("issueIndex").and_then(serde_json::Value::as_u64).unwrap_or(0) as usize;
            let status = raw
                .get("status")
                .and_then(|v| serde_json::from_value::<ActionStatus>(v.clone()).ok())
                .unwrap_or(ActionStatus::Skipped);
            let output_type = raw
                .get("outputType")
                .or_else(|| raw.get("output_type"))
                .and_then(|v| serde_json::from_value::<ActionOutputType>(v.clone()).ok());
            let file = raw.get("file").and_then(serde_json::Value::as_str).map(str::to_owned);
            let short_summary = raw
                .get("summary")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("")
                .to_owned();

            ActionSummary {
                issue_index: batch_offset + local_index,
                status,
                file,
                output_type,
                short_summary,
            }
        })
        .collect()
}

fn severity_of(issue: &Issue) -> u8 {
    match issue {
        Issue::Error { severity, .. } => *severity,
        Issue::Suggestion { .. } => 0,
    }
}

fn impact_weight(issue: &Issue) -> u32 {
    match issue {
        Issue::Suggestion { impact_level, .. } => impact_level.weight(),
        Issue::Error { .. } => 0,
    }
}

/// Rewrite each un-consolidated colocated pair's alias into a reference
/// pointer and fold its content into the canonical file (`spec.md` §4.7
/// step 3).
async fn consolidate_colocated_pairs(
    root: &Path,
    provider: &Arc<dyn Provider>,
    timeout: Duration,
    cancellation: &CancellationToken,
    issues: &mut [Issue],
) -> Result<()> {
    let discovery = FileDiscovery::discover(root)?;
    let content_by_path: std::collections::HashMap<&str, &str> =
        discovery.files.iter().map(|f| (f.relative_path.as_str(), f.content.as_str())).collect();

    for pair in &discovery.colocated_pairs {
        if pair.already_consolidated {
            continue;
        }
        let Some(&canonical_content) = content_by_path.get(pair.canonical_path.as_str()) else { continue };
        let Some(&alias_content) = content_by_path.get(pair.alias_path.as_str()) else { continue };

        let merged = merge_colocated(provider, canonical_content, alias_content, timeout, cancellation.clone()).await;

        std::fs::write(root.join(&pair.canonical_path), merged)?;
        std::fs::write(root.join(&pair.alias_path), format!("@{}\n", pair.canonical_path))?;

        rewrite_issue_locations(issues, &pair.alias_path, &pair.canonical_path);
    }

    Ok(())
}

async fn merge_colocated(
    provider: &Arc<dyn Provider>,
    canonical_content: &str,
    alias_content: &str,
    timeout: Duration,
    cancellation: CancellationToken,
) -> String {
    let naive = format!("{}\n\n{MERGE_DELIMITER}\n{}\n", canonical_content.trim_end(), alias_content.trim());

    let prompt = format!(
        "Merge these two documentation files into one coherent file, preserving all distinct guidance:\n\n--- canonical ---\n{canonical_content}\n\n--- alias ---\n{alias_content}"
    );
    let options = InvokeOptions {
        cwd: std::env::temp_dir(),
        write_mode: false,
        timeout,
        cancellation,
    };
    let Ok(response) = provider.invoke(&prompt, &options).await else {
        return naive;
    };

    let merged = response.result_text.trim();
    let min_len = canonical_content.len().min(alias_content.len());
    if merged.is_empty() || merged.len() < (min_len as f64 * AI_MERGE_MIN_RATIO) as usize {
        return naive;
    }
    merged.to_owned()
}

fn rewrite_issue_locations(issues: &mut [Issue], from_path: &str, to_path: &str) {
    for issue in issues.iter_mut() {
        match &mut issue.common_mut().location {
            Location::Single(loc) => rewrite_one_location(loc, from_path, to_path),
            Location::Multiple(locs) => {
                for loc in locs.iter_mut() {
                    rewrite_one_location(loc, from_path, to_path);
                }
            }
        }
    }
}

fn rewrite_one_location(loc: &mut FileLocation, from_path: &str, to_path: &str) {
    if loc.file.as_deref() == Some(from_path) {
        loc.file = Some(to_path.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::stream::{self, BoxStream};
    use repodoc_domain::error::Result as DomainResult;
    use repodoc_domain::ports::{InvokeResponse, TokenUsage};

    use super::*;
    use repodoc_domain::entities::{FileLocation as FL, ImpactLevel, IssueCommon};

    fn error(severity: u8) -> Issue {
        Issue::Error {
            common: IssueCommon {
                category: "docs".to_owned(),
                problem: Some("vague setup".to_owned()),
                description: None,
                title: None,
                location: Location::Single(FL { file: Some("CLAUDE.md".to_owned()), start_line: 1, end_line: 2 }),
                snippet: None,
                fix: None,
                evaluator_name: "eval-A".to_owned(),
                affected_files: None,
                is_phantom_file: false,
            },
            severity,
        }
    }

    #[test]
    fn parse_actions_defaults_missing_status_to_skipped() {
        let text = "{\"actions\": [{\"issueIndex\": 0, \"file\": \"AGENTS.md\", \"summary\": \"noted\"}]}";
        let actions = parse_actions(text, 0);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].status, ActionStatus::Skipped);
        assert_eq!(actions[0].short_summary, "noted");
    }

    #[test]
    fn parse_actions_remaps_batch_offset() {
        let text = "{\"actions\": [{\"issueIndex\": 3, \"status\": \"fixed\", \"summary\": \"x\"}]}";
        let actions = parse_actions(text, 100);
        assert_eq!(actions[0].issue_index, 103);
    }

    #[test]
    fn rewrite_issue_locations_updates_single_location() {
        let mut issues = vec![error(8)];
        rewrite_issue_locations(&mut issues, "CLAUDE.md", "AGENTS.md");
        match &issues[0].common().location {
            Location::Single(loc) => assert_eq!(loc.file.as_deref(), Some("AGENTS.md")),
            Location::Multiple(_) => panic!("expected single location"),
        }
    }

    #[test]
    fn severity_and_impact_sorting_keys_are_descending() {
        let high_error = error(9);
        let low_error = error(2);
        assert!(severity_of(&high_error) > severity_of(&low_error));

        let suggestion = Issue::Suggestion {
            common: IssueCommon {
                category: "docs".to_owned(),
                problem: Some("add example".to_owned()),
                description: None,
                title: None,
                location: Location::Single(FL { file: Some("AGENTS.md".to_owned()), start_line: 1, end_line: 1 }),
                snippet: None,
                fix: None,
                evaluator_name: "eval-A".to_owned(),
                affected_files: None,
                is_phantom_file: false,
            },
            impact_level: ImpactLevel::High,
        };
        assert_eq!(impact_weight(&suggestion), 9);
    }

    struct FakeGitWorkspace;

    #[async_trait]
    impl GitWorkspace for FakeGitWorkspace {
        async fn clone(&self, _url: &str, _spec: &CloneSpec) -> DomainResult<ClonedWorkspace> {
            unreachable!("this fixture always resolves a local path, never a fresh clone")
        }

        async fn release(&self, _workspace: ClonedWorkspace) -> DomainResult<()> {
            Ok(())
        }

        async fn is_clean(&self, _cwd: &Path) -> DomainResult<bool> {
            Ok(true)
        }

        async fn capture_diff(&self, _cwd: &Path) -> DomainResult<String> {
            Ok(String::new())
        }

        async fn reset(&self, _cwd: &Path) -> DomainResult<()> {
            Ok(())
        }
    }

    struct FakeProvider {
        response_text: String,
    }

    #[async_trait]
    impl Provider for FakeProvider {
        fn name(&self) -> &str {
            "fake"
        }

        async fn invoke(&self, _prompt: &str, _options: &repodoc_domain::ports::InvokeOptions) -> DomainResult<InvokeResponse> {
            Ok(InvokeResponse {
                result_text: self.response_text.clone(),
                usage: TokenUsage::default(),
                cost_usd: 0.0,
                duration_ms: 1,
            })
        }

        async fn invoke_with_retry(
            &self,
            prompt: &str,
            options: &repodoc_domain::ports::InvokeOptions,
            _policy: repodoc_domain::ports::RetryPolicy,
            _retry_context: &repodoc_domain::ports::RetryContext,
        ) -> DomainResult<InvokeResponse> {
            self.invoke(prompt, options).await
        }
    }

    #[derive(Default)]
    struct RecordingEventBus {
        events: Mutex<Vec<DomainEvent>>,
    }

    #[async_trait]
    impl EventBus for RecordingEventBus {
        async fn publish(&self, _job_id: JobId, event: DomainEvent) {
            self.events.lock().unwrap().push(event);
        }

        fn subscribe(&self, _job_id: JobId) -> BoxStream<'static, DomainEvent> {
            Box::pin(stream::empty())
        }
    }

    fn event_kind(event: &DomainEvent) -> String {
        serde_json::to_value(event)
            .ok()
            .and_then(|v| v.get("type").and_then(|t| t.as_str().map(str::to_owned)))
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn happy_path_plans_and_executes_a_single_error_fix() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("AGENTS.md"), "# Setup\nRun `make build`.\n").expect("write fixture");

        let git_workspace = Arc::new(FakeGitWorkspace);
        let event_bus = Arc::new(RecordingEventBus::default());
        let provider: Arc<dyn Provider> = Arc::new(FakeProvider {
            response_text: r#"{"actions": [{"issueIndex": 0, "status": "fixed", "file": "AGENTS.md", "outputType": "standard", "summary": "added setup steps"}]}"#.to_owned(),
        });

        let orchestrator = RemediationOrchestrator::new(git_workspace, event_bus.clone());
        let job_id = JobId::from_name("remediation-happy-path");
        let request = RemediationRequest {
            repository_url: None,
            local_path: Some(dir.path().to_path_buf()),
            branch: None,
            commit_sha: None,
            issues: vec![error(8)],
            target_agent: TargetAgent::AgentsMd,
            timeout: Duration::from_secs(5),
        };

        let result = orchestrator
            .run(job_id, request, provider, RemediationConfig::default(), CancellationToken::new())
            .await
            .expect("remediation run should succeed");

        assert_eq!(result.action_summary.len(), 1);
        assert_eq!(result.action_summary[0].status, ActionStatus::Fixed);
        assert_eq!(result.action_summary[0].issue_index, 0);
        assert!(!result.error_plan_text.is_empty());
        assert!(result.suggestion_plan_text.is_empty(), "no suggestions were submitted");

        let events = event_bus.events.lock().unwrap();
        let kinds: Vec<String> = events.iter().map(event_kind).collect();
        let step_starts = kinds.iter().filter(|k| *k == "remediation.step.started").count();
        let step_completions = kinds.iter().filter(|k| *k == "remediation.step.completed").count();
        assert_eq!(step_starts, step_completions, "every started step must report completion");
        assert_eq!(kinds.first().map(String::as_str), Some("remediation.step.started"));
        assert_eq!(kinds.last().map(String::as_str), Some("remediation.step.completed"));
        assert!(kinds.contains(&"remediation.progress".to_owned()));
    }

    #[tokio::test]
    async fn a_dirty_working_tree_is_rejected_before_any_provider_call() {
        struct DirtyGitWorkspace;

        #[async_trait]
        impl GitWorkspace for DirtyGitWorkspace {
            async fn clone(&self, _url: &str, _spec: &CloneSpec) -> DomainResult<ClonedWorkspace> {
                unreachable!()
            }

            async fn release(&self, _workspace: ClonedWorkspace) -> DomainResult<()> {
                Ok(())
            }

            async fn is_clean(&self, _cwd: &Path) -> DomainResult<bool> {
                Ok(false)
            }

            async fn capture_diff(&self, _cwd: &Path) -> DomainResult<String> {
                unreachable!("a dirty tree must never reach the capture-diff step")
            }

            async fn reset(&self, _cwd: &Path) -> DomainResult<()> {
                Ok(())
            }
        }

        struct PanicProvider;

        #[async_trait]
        impl Provider for PanicProvider {
            fn name(&self) -> &str {
                "panic"
            }

            async fn invoke(&self, _prompt: &str, _options: &repodoc_domain::ports::InvokeOptions) -> DomainResult<InvokeResponse> {
                unreachable!("a dirty working tree must never reach a provider call")
            }

            async fn invoke_with_retry(
                &self,
                _prompt: &str,
                _options: &repodoc_domain::ports::InvokeOptions,
                _policy: repodoc_domain::ports::RetryPolicy,
                _retry_context: &repodoc_domain::ports::RetryContext,
            ) -> DomainResult<InvokeResponse> {
                unreachable!("a dirty working tree must never reach a provider call")
            }
        }

        let orchestrator = RemediationOrchestrator::new(Arc::new(DirtyGitWorkspace), Arc::new(RecordingEventBus::default()));
        let request = RemediationRequest {
            repository_url: None,
            local_path: Some(std::env::temp_dir()),
            branch: None,
            commit_sha: None,
            issues: vec![error(5)],
            target_agent: TargetAgent::AgentsMd,
            timeout: Duration::from_secs(5),
        };

        let err = orchestrator
            .run(JobId::from_name("remediation-dirty-tree"), request, Arc::new(PanicProvider), RemediationConfig::default(), CancellationToken::new())
            .await
            .expect_err("a dirty working tree must be rejected");

        assert!(matches!(err, Error::InvalidRequest { .. }));
    }
}
