//! Evaluation result entities (`spec.md` §3).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::issue::Issue;
use crate::value_objects::EvaluationMode;

/// Category an evaluator failure is bucketed into (`spec.md` §4.5, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// The provider invocation timed out on every attempt.
    Timeout,
    /// The provider response could not be parsed into issues.
    Parsing,
    /// A filesystem operation failed.
    FileSystem,
    /// The provider itself reported a failure.
    Provider,
    /// A repository/git operation failed.
    Repository,
    /// Anything not covered by the above.
    Internal,
}

impl FailureCategory {
    /// Keyword table used to classify an error message by case-insensitive
    /// substring scan (`spec.md` §4.5).
    #[must_use]
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        const TIMEOUT_KEYWORDS: &[&str] = &["timed out", "timeout", "deadline exceeded"];
        const PARSING_KEYWORDS: &[&str] = &["parse", "json", "unexpected token", "invalid syntax"];
        const FS_KEYWORDS: &[&str] = &["no such file", "permission denied", "io error", "enoent"];
        const REPO_KEYWORDS: &[&str] = &["clone", "checkout", "fatal: repository", "git"];
        const PROVIDER_KEYWORDS: &[&str] = &["provider", "subprocess", "exit code", "command failed"];

        if TIMEOUT_KEYWORDS.iter().any(|k| lower.contains(k)) {
            Self::Timeout
        } else if PARSING_KEYWORDS.iter().any(|k| lower.contains(k)) {
            Self::Parsing
        } else if REPO_KEYWORDS.iter().any(|k| lower.contains(k)) {
            Self::Repository
        } else if FS_KEYWORDS.iter().any(|k| lower.contains(k)) {
            Self::FileSystem
        } else if PROVIDER_KEYWORDS.iter().any(|k| lower.contains(k)) {
            Self::Provider
        } else {
            Self::Internal
        }
    }
}

/// Record of an evaluator that failed to produce issues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedEvaluator {
    /// Evaluator id that failed.
    pub evaluator_name: String,
    /// File it was evaluating, if the mode is independent.
    pub file: Option<String>,
    /// Classification of the failure.
    pub category: FailureCategory,
    /// Truncated error message.
    pub message: String,
}

/// One colocated-pair record surfaced in project context (`spec.md` §3).
pub use crate::entities::colocated::ColocatedPair;

/// Line-count-tool summary for the repository, when the tool was available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineCountSummary {
    /// Total lines counted across all languages.
    pub total_lines: u64,
    /// Per-language line counts, as reported by the tool.
    pub by_language: HashMap<String, u64>,
}

/// Project-wide context gathered before evaluation (`spec.md` §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectContext {
    /// Detected languages, comma-joined or "Unknown".
    pub languages: String,
    /// Detected frameworks, comma-joined or "Unknown".
    pub frameworks: String,
    /// Detected architecture summary, or "Unknown".
    pub architecture: String,
    /// Detected patterns summary, or "Unknown".
    pub patterns: String,
    /// Raw provider response text, kept for debugging/audit.
    pub raw_response_text: String,
    /// Line-count summary, absent when the `cloc`-class tool was unavailable.
    pub line_count_summary: Option<LineCountSummary>,
    /// Up to 20 top-level folders surfaced to the evaluators as context.
    pub key_folders: Vec<String>,
    /// Documentation file paths already known from discovery.
    pub known_doc_paths: Vec<String>,
    /// Whether the line-count tool ran successfully.
    pub line_count_available: bool,
}

impl ProjectContext {
    /// The all-"Unknown" context returned when analysis fails entirely
    /// (`spec.md` §4.3: "never fail the job").
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            languages: "Unknown".to_owned(),
            frameworks: "Unknown".to_owned(),
            architecture: "Unknown".to_owned(),
            patterns: "Unknown".to_owned(),
            raw_response_text: String::new(),
            line_count_summary: None,
            key_folders: Vec::new(),
            known_doc_paths: Vec::new(),
            line_count_available: false,
        }
    }
}

/// The raw provider response plus parsed issues for one evaluator invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorResult {
    /// Evaluator id.
    pub evaluator_name: String,
    /// File evaluated, when the mode is independent.
    pub file: Option<String>,
    /// Raw provider response text.
    pub raw_response_text: String,
    /// Parsed, normalized issues.
    pub issues: Vec<Issue>,
}

/// Per-file evaluation results in independent mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileEvaluations {
    /// One entry per evaluator that ran against this file.
    pub evaluations: Vec<EvaluatorResult>,
    /// Total issue count across `evaluations`, cached for quick listing.
    pub total_issues: usize,
}

/// The two possible shapes of an evaluation's findings (`spec.md` §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum EvaluationBody {
    /// One evaluator ran once across all target files.
    Unified {
        /// Results, one per evaluator.
        results: Vec<EvaluatorResult>,
    },
    /// One evaluator ran per target file.
    Independent {
        /// Results keyed by file path.
        files: HashMap<String, FileEvaluations>,
    },
}

/// Curated selection for one issue type (`spec.md` §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurationBlock {
    /// The curated, impact-ranked issue list.
    pub curated_issues: Vec<Issue>,
    /// Total issues reviewed before curation.
    pub total_reviewed: usize,
    /// Provider-supplied rationale for the chosen ordering.
    pub ordering_rationale: String,
    /// Cost in USD of the curation call.
    pub cost_usd: f64,
    /// Wall-clock duration of the curation call, in milliseconds.
    pub duration_ms: u64,
}

/// Output of the Curator for a full evaluation (`spec.md` §3, §4.9).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurationOutput {
    /// Curated error issues, present only when curation ran for errors.
    pub errors: Option<CurationBlock>,
    /// Curated suggestion issues, present only when curation ran for suggestions.
    pub suggestions: Option<CurationBlock>,
}

/// Aggregated cost/duration/token totals across every provider invocation in
/// an evaluation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageTotals {
    /// Sum of `costUsd` across every invocation.
    pub total_cost_usd: f64,
    /// Sum of wall-clock durations, in milliseconds.
    pub total_duration_ms: u64,
    /// Sum of input tokens.
    pub total_input_tokens: u64,
    /// Sum of output tokens.
    pub total_output_tokens: u64,
}

/// Metadata shared by both evaluation body shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationMetadata {
    /// When the evaluation finished.
    pub generated_at: DateTime<Utc>,
    /// Provider used for every invocation in this run.
    pub provider: String,
    /// Fan-out mode used.
    pub mode: EvaluationMode,
    /// Number of files targeted.
    pub total_files: usize,
    /// Project-wide context gathered before evaluation.
    pub project_context: ProjectContext,
    /// Aggregated cost/duration/token totals.
    pub usage: UsageTotals,
    /// Evaluators that failed to produce results.
    pub failed_evaluators: Vec<FailedEvaluator>,
    /// Curation results, when curation ran.
    pub curation: Option<CurationOutput>,
}

/// The complete output of an evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Shared metadata.
    pub metadata: EvaluationMetadata,
    /// Per-mode findings.
    pub body: EvaluationBody,
    /// Cross-file issues, surfaced regardless of mode.
    pub cross_file_issues: Vec<Issue>,
}

impl EvaluationResult {
    /// Every issue in this result, across all evaluators and files, plus
    /// cross-file issues — used by the §8 invariant
    /// `countIssues(E) == sum over evaluators of issues emitted`.
    #[must_use]
    pub fn all_issues(&self) -> Vec<&Issue> {
        let mut issues = Vec::new();
        match &self.body {
            EvaluationBody::Unified { results } => {
                for result in results {
                    issues.extend(result.issues.iter());
                }
            }
            EvaluationBody::Independent { files } => {
                for file in files.values() {
                    for evaluation in &file.evaluations {
                        issues.extend(evaluation.issues.iter());
                    }
                }
            }
        }
        issues.extend(self.cross_file_issues.iter());
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_timeout_by_keyword() {
        assert_eq!(
            FailureCategory::classify("operation timed out after 120s"),
            FailureCategory::Timeout
        );
    }

    #[test]
    fn classify_parsing_by_keyword() {
        assert_eq!(
            FailureCategory::classify("failed to parse JSON response"),
            FailureCategory::Parsing
        );
    }

    #[test]
    fn classify_repository_before_provider_keyword_overlap() {
        assert_eq!(
            FailureCategory::classify("git clone failed: fatal: repository not found"),
            FailureCategory::Repository
        );
    }

    #[test]
    fn classify_unknown_as_internal() {
        assert_eq!(
            FailureCategory::classify("something unexpected happened"),
            FailureCategory::Internal
        );
    }

    #[test]
    fn unknown_context_has_all_unknown_fields() {
        let ctx = ProjectContext::unknown();
        assert_eq!(ctx.languages, "Unknown");
        assert!(!ctx.line_count_available);
        assert!(ctx.key_folders.is_empty());
    }
}
