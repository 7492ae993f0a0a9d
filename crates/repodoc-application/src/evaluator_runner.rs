//! Evaluator Runner: one evaluator × file invocation (`spec.md` §4.5, M1).

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use repodoc_domain::entities::{FailureCategory, FileLocation, Issue, IssueCommon, Location};
use repodoc_domain::error::{Error, Result};
use repodoc_domain::events::DomainEvent;
use repodoc_domain::ports::{EventBus, InvokeOptions, Provider, RetryContext, RetryPolicy};
use repodoc_domain::value_objects::JobId;
use tokio_util::sync::CancellationToken;

use crate::json_block::extract_json_object;

/// Which coarse issue type an evaluator is registered to produce, driving
/// `evaluatorFilter ∈ {all, errors-only, suggestions-only}` (`spec.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluatorIssueKind {
    /// Only ever emits `Issue::Error`.
    Errors,
    /// Only ever emits `Issue::Suggestion`.
    Suggestions,
    /// May emit either, at the model's discretion.
    Both,
}

impl EvaluatorIssueKind {
    /// Whether this issue kind should run under the given evaluator filter.
    #[must_use]
    pub fn matches(self, filter: repodoc_domain::value_objects::EvaluatorFilter) -> bool {
        use repodoc_domain::value_objects::EvaluatorFilter;
        match filter {
            EvaluatorFilter::All => true,
            EvaluatorFilter::ErrorsOnly => matches!(self, Self::Errors | Self::Both),
            EvaluatorFilter::SuggestionsOnly => matches!(self, Self::Suggestions | Self::Both),
        }
    }
}

/// An evaluator's static definition: its prompt template and the issue
/// shape it is expected to produce (`spec.md` §4.5 input).
#[derive(Debug, Clone)]
pub struct EvaluatorDefinition {
    /// Stable evaluator id, attached to every issue it produces.
    pub name: String,
    /// Prompt template; `{{FILE_CONTENT}}`, `{{FILE_PATH}}`, and
    /// `{{PROJECT_CONTEXT}}` are substituted before invocation.
    pub prompt_template: String,
    /// Default severity (1..=10) applied when an error issue omits one.
    pub default_severity: u8,
    /// Whether this evaluator analyzes one file or the whole tree at once.
    pub cross_file: bool,
    /// Coarse issue type this evaluator is registered under.
    pub issue_kind: EvaluatorIssueKind,
}

/// Shared bookkeeping for one evaluator's progress across every (file,
/// evaluator) task it is scheduled for (`spec.md` §4.5 step 5). `completed`
/// is shared across concurrent tasks for the same evaluator so each one
/// reports an accurate snapshot regardless of fan-out order.
#[derive(Clone)]
pub struct EvaluatorProgressTracker {
    /// Invocations completed so far for this evaluator.
    pub completed: Arc<AtomicU32>,
    /// Invocations targeted in total for this evaluator.
    pub total: u32,
}

/// Input to one evaluator invocation.
pub struct EvaluatorTask<'a> {
    /// The evaluator being run.
    pub definition: &'a EvaluatorDefinition,
    /// File path relative to the repository root, or `None` for a
    /// cross-file evaluator.
    pub file: Option<String>,
    /// File content, when `file` is `Some`.
    pub file_content: String,
    /// Rendered project-context block.
    pub project_context_block: String,
    /// Progress bookkeeping shared across every task for this evaluator.
    pub progress: EvaluatorProgressTracker,
}

/// The outcome of one evaluator invocation: either issues, or a failure
/// bucketed per `spec.md` §4.5's failure policy.
pub enum EvaluatorOutcome {
    /// The evaluator produced issues (possibly zero).
    Issues {
        /// Parsed, normalized issues.
        issues: Vec<Issue>,
        /// Raw provider response text.
        raw_response_text: String,
    },
    /// The evaluator failed; non-fatal to the overall job.
    Failed {
        /// Classified failure category.
        category: FailureCategory,
        /// Truncated error message.
        message: String,
    },
}

/// Runs one evaluator × file task against a provider (`spec.md` §4.5).
pub struct EvaluatorRunner {
    provider: Arc<dyn Provider>,
    event_bus: Arc<dyn EventBus>,
    retry_policy: RetryPolicy,
}

impl EvaluatorRunner {
    /// Build a runner over the given provider and event sink.
    #[must_use]
    pub fn new(provider: Arc<dyn Provider>, event_bus: Arc<dyn EventBus>, retry_policy: RetryPolicy) -> Self {
        Self { provider, event_bus, retry_policy }
    }

    /// Run one evaluator × file task, never propagating a hard error —
    /// failures are captured in [`EvaluatorOutcome::Failed`].
    pub async fn run(
        &self,
        job_id: JobId,
        task: EvaluatorTask<'_>,
        cwd: &Path,
        timeout: Duration,
        cancellation: CancellationToken,
    ) -> EvaluatorOutcome {
        let prompt = render_prompt(&task);
        let options = InvokeOptions {
            cwd: cwd.to_path_buf(),
            write_mode: false,
            timeout,
            cancellation,
        };

        self.event_bus
            .publish(
                job_id,
                DomainEvent::EvaluatorProgress {
                    job_id,
                    evaluator_name: task.definition.name.clone(),
                    completed: task.progress.completed.load(Ordering::SeqCst),
                    total: task.progress.total,
                },
            )
            .await;

        let retry_context = RetryContext {
            job_id,
            evaluator_name: task.definition.name.clone(),
            event_bus: self.event_bus.clone(),
        };

        let outcome = match self
            .provider
            .invoke_with_retry(&prompt, &options, self.retry_policy, &retry_context)
            .await
        {
            Ok(response) => match parse_issues(&response.result_text, task.definition) {
                Ok(issues) => {
                    self.event_bus
                        .publish(
                            job_id,
                            DomainEvent::EvaluatorCompleted {
                                job_id,
                                evaluator_name: task.definition.name.clone(),
                                file: task.file.clone(),
                                issue_count: issues.len(),
                            },
                        )
                        .await;
                    EvaluatorOutcome::Issues {
                        issues,
                        raw_response_text: response.result_text,
                    }
                }
                Err(err) => EvaluatorOutcome::Failed {
                    category: FailureCategory::classify(&err.to_string()),
                    message: truncate(&err.to_string()),
                },
            },
            // Per-attempt `evaluator.retry`/`evaluator.timeout` events are
            // published by the provider's own retry loop via `RetryContext`.
            Err(err) => EvaluatorOutcome::Failed {
                category: FailureCategory::classify(&err.to_string()),
                message: truncate(&err.to_string()),
            },
        };

        task.progress.completed.fetch_add(1, Ordering::SeqCst);
        outcome
    }
}

fn render_prompt(task: &EvaluatorTask<'_>) -> String {
    task.definition
        .prompt_template
        .replace("{{FILE_CONTENT}}", &task.file_content)
        .replace("{{FILE_PATH}}", task.file.as_deref().unwrap_or(""))
        .replace("{{PROJECT_CONTEXT}}", &task.project_context_block)
}

/// Extract, validate, and normalize issues from a provider response
/// (`spec.md` §4.5 steps 3-4).
pub fn parse_issues(response_text: &str, definition: &EvaluatorDefinition) -> Result<Vec<Issue>> {
    let value = extract_json_object(response_text, "issues").ok_or_else(|| Error::ResponseParse {
        message: "no JSON object containing an `issues` key was found".to_owned(),
    })?;

    let raw_issues = value
        .get("issues")
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::ResponseParse {
            message: "`issues` field was not an array".to_owned(),
        })?;

    let mut issues = Vec::with_capacity(raw_issues.len());
    for raw in raw_issues {
        issues.push(normalize_issue(raw, definition)?);
    }
    Ok(issues)
}

fn normalize_issue(raw: &serde_json::Value, definition: &EvaluatorDefinition) -> Result<Issue> {
    let location = parse_location(raw.get("location")).ok_or_else(|| Error::ResponseParse {
        message: "issue is missing a `location`".to_owned(),
    })?;

    let mut common: IssueCommon = serde_json::from_value(raw.clone()).map_err(Error::from)?;
    common.location = location;
    common.evaluator_name = definition.name.clone();

    let is_suggestion = raw.get("impactLevel").is_some() || raw.get("impact_level").is_some();
    if is_suggestion {
        let impact_level = serde_json::from_value(
            raw.get("impactLevel")
                .or_else(|| raw.get("impact_level"))
                .cloned()
                .unwrap_or(serde_json::Value::String("medium".to_owned())),
        )
        .map_err(Error::from)?;
        Ok(Issue::Suggestion { common, impact_level })
    } else {
        let severity = raw
            .get("severity")
            .and_then(serde_json::Value::as_u64)
            .map(|s| s.min(10) as u8)
            .unwrap_or(definition.default_severity);
        Ok(Issue::Error { common, severity })
    }
}

fn parse_location(value: Option<&serde_json::Value>) -> Option<Location> {
    let value = value?;
    if value.is_array() {
        let locations: Vec<FileLocation> = serde_json::from_value(value.clone()).ok()?;
        Some(Location::Multiple(locations))
    } else {
        let location: FileLocation = serde_json::from_value(value.clone()).ok()?;
        Some(Location::Single(location))
    }
}

fn truncate(message: &str) -> String {
    const MAX_LEN: usize = 500;
    if message.len() <= MAX_LEN {
        message.to_owned()
    } else {
        format!("{}…", &message[..MAX_LEN])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> EvaluatorDefinition {
        EvaluatorDefinition {
            name: "eval-A".to_owned(),
            prompt_template: "Review {{FILE_PATH}}:\n{{FILE_CONTENT}}\n{{PROJECT_CONTEXT}}".to_owned(),
            default_severity: 5,
            cross_file: false,
            issue_kind: EvaluatorIssueKind::Both,
        }
    }

    #[test]
    fn render_prompt_substitutes_all_placeholders() {
        let def = definition();
        let task = EvaluatorTask {
            definition: &def,
            file: Some("AGENTS.md".to_owned()),
            file_content: "content".to_owned(),
            project_context_block: "ctx".to_owned(),
            progress: EvaluatorProgressTracker { completed: Arc::new(AtomicU32::new(0)), total: 1 },
        };
        let prompt = render_prompt(&task);
        assert_eq!(prompt, "Review AGENTS.md:\ncontent\nctx");
    }

    #[test]
    fn parse_issues_defaults_missing_severity_and_attaches_evaluator_name() {
        let text = "```json\n{\"issues\": [{\"category\":\"docs\",\"problem\":\"vague\",\"location\":{\"start_line\":1,\"end_line\":2}}]}\n```";
        let issues = parse_issues(text, &definition()).expect("parse");
        assert_eq!(issues.len(), 1);
        match &issues[0] {
            Issue::Error { common, severity } => {
                assert_eq!(*severity, 5);
                assert_eq!(common.evaluator_name, "eval-A");
            }
            Issue::Suggestion { .. } => panic!("expected an error issue"),
        }
    }

    #[test]
    fn parse_issues_recognizes_suggestion_shape() {
        let text = "{\"issues\": [{\"category\":\"docs\",\"title\":\"add example\",\"location\":{\"start_line\":1,\"end_line\":1},\"impactLevel\":\"high\"}]}";
        let issues = parse_issues(text, &definition()).expect("parse");
        assert!(matches!(issues[0], Issue::Suggestion { .. }));
    }

    #[test]
    fn parse_issues_accepts_array_location_for_cross_file_findings() {
        let text = "{\"issues\": [{\"category\":\"consistency\",\"problem\":\"mismatch\",\"location\":[{\"file\":\"A.md\",\"start_line\":1,\"end_line\":1},{\"file\":\"B.md\",\"start_line\":2,\"end_line\":2}],\"severity\":7,\"affected_files\":[\"A.md\",\"B.md\"]}]}";
        let issues = parse_issues(text, &definition()).expect("parse");
        assert!(issues[0].is_cross_file());
        assert_eq!(issues[0].common().location.entries().len(), 2);
    }

    #[test]
    fn issue_kind_matches_respects_filter() {
        use repodoc_domain::value_objects::EvaluatorFilter;
        assert!(EvaluatorIssueKind::Errors.matches(EvaluatorFilter::All));
        assert!(EvaluatorIssueKind::Errors.matches(EvaluatorFilter::ErrorsOnly));
        assert!(!EvaluatorIssueKind::Errors.matches(EvaluatorFilter::SuggestionsOnly));
        assert!(EvaluatorIssueKind::Both.matches(EvaluatorFilter::ErrorsOnly));
        assert!(EvaluatorIssueKind::Both.matches(EvaluatorFilter::SuggestionsOnly));
    }

    #[test]
    fn parse_issues_rejects_missing_location() {
        let text = "{\"issues\": [{\"category\":\"docs\",\"problem\":\"x\"}]}";
        let err = parse_issues(text, &definition()).expect_err("should fail");
        assert_eq!(err.category(), repodoc_domain::ErrorCategory::Parsing);
    }
}
