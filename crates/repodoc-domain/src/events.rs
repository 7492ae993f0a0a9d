//! Domain events published on the SSE Bus (`spec.md` §4.11).
//!
//! The bus publishes *domain* events only; any UI log line is a separate
//! adapter's concern (`spec.md` §9 redesign note).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::JobId;

/// Which coarse issue type a curation pass covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    /// Error-type issues.
    Errors,
    /// Suggestion-type issues.
    Suggestions,
}

/// A named step of the remediation plan/execute pipeline (`spec.md` §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationStep {
    /// Cloning the target repository.
    Cloning,
    /// Verifying the working tree is clean before mutating it.
    CheckingGit,
    /// Consolidating colocated documentation pairs.
    ConsolidatingFiles,
    /// Phase 1: planning error fixes.
    PlanningErrorFix,
    /// Phase 2: executing error fixes.
    ExecutingErrorFix,
    /// Capturing the intermediate error-fix diff.
    CapturingErrorDiff,
    /// Phase 3: planning suggestion enrichment.
    PlanningSuggestionEnrich,
    /// Phase 4: executing suggestion enrichment.
    ExecutingSuggestionEnrich,
    /// Capturing the final diff.
    CapturingDiff,
    /// Resetting the working tree to HEAD.
    Resetting,
}

/// One domain event, tagged by `type` using the exact names from
/// `spec.md` §4.11 so the SSE wire format's `event:<name>` line matches the
/// enum variant's serialized tag (`spec.md` §6.1 SSE wire format note).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    /// A job was picked up by a worker and began running.
    #[serde(rename = "job.started")]
    JobStarted {
        /// Job this event belongs to.
        job_id: JobId,
    },
    /// Cloning the target repository began.
    #[serde(rename = "clone.started")]
    CloneStarted {
        /// Job this event belongs to.
        job_id: JobId,
    },
    /// Cloning finished successfully.
    #[serde(rename = "clone.completed")]
    CloneCompleted {
        /// Job this event belongs to.
        job_id: JobId,
        /// Commit SHA checked out.
        commit_sha: String,
    },
    /// Cloning succeeded but something non-fatal went wrong (e.g. submodule
    /// failure).
    #[serde(rename = "clone.warning")]
    CloneWarning {
        /// Job this event belongs to.
        job_id: JobId,
        /// Human-readable warning text.
        message: String,
    },
    /// File discovery began.
    #[serde(rename = "discovery.started")]
    DiscoveryStarted {
        /// Job this event belongs to.
        job_id: JobId,
    },
    /// File discovery finished.
    #[serde(rename = "discovery.completed")]
    DiscoveryCompleted {
        /// Job this event belongs to.
        job_id: JobId,
        /// Number of documentation files discovered.
        files_found: usize,
    },
    /// The line-count subprocess started.
    #[serde(rename = "context.cloc")]
    ContextCloc {
        /// Job this event belongs to.
        job_id: JobId,
        /// Whether the tool has finished (`false` on start, `true` on completion).
        completed: bool,
    },
    /// Top-level folder enumeration started or finished.
    #[serde(rename = "context.folders")]
    ContextFolders {
        /// Job this event belongs to.
        job_id: JobId,
        /// Whether enumeration has finished.
        completed: bool,
    },
    /// The project-context provider call started or finished.
    #[serde(rename = "context.analysis")]
    ContextAnalysis {
        /// Job this event belongs to.
        job_id: JobId,
        /// Whether the call has finished.
        completed: bool,
    },
    /// A non-fatal context-gathering failure (`spec.md` §4.3: never fail
    /// the job over context analysis).
    #[serde(rename = "context.warning")]
    ContextWarning {
        /// Job this event belongs to.
        job_id: JobId,
        /// Human-readable warning text.
        message: String,
    },
    /// Evaluation of one file began.
    #[serde(rename = "file.started")]
    FileStarted {
        /// Job this event belongs to.
        job_id: JobId,
        /// File path relative to the repository root.
        file: String,
    },
    /// All evaluators finished running against one file.
    #[serde(rename = "file.completed")]
    FileCompleted {
        /// Job this event belongs to.
        job_id: JobId,
        /// File path relative to the repository root.
        file: String,
        /// Issues found across all evaluators for this file.
        total_issues: usize,
    },
    /// An evaluator invocation was submitted.
    #[serde(rename = "evaluator.progress")]
    EvaluatorProgress {
        /// Job this event belongs to.
        job_id: JobId,
        /// Evaluator id.
        evaluator_name: String,
        /// Invocations completed so far.
        completed: u32,
        /// Invocations targeted in total.
        total: u32,
    },
    /// An evaluator invocation finished successfully.
    #[serde(rename = "evaluator.completed")]
    EvaluatorCompleted {
        /// Job this event belongs to.
        job_id: JobId,
        /// Evaluator id.
        evaluator_name: String,
        /// File evaluated, when the mode is independent.
        file: Option<String>,
        /// Issues this invocation produced.
        issue_count: usize,
    },
    /// An evaluator invocation is being retried (`spec.md` §4.5 retry policy).
    #[serde(rename = "evaluator.retry")]
    EvaluatorRetry {
        /// Job this event belongs to.
        job_id: JobId,
        /// Evaluator id.
        evaluator_name: String,
        /// Attempt number just completed (1-indexed).
        attempt: u32,
        /// Maximum attempts configured.
        max: u32,
        /// Truncated error message from the failed attempt.
        error: String,
        /// Attempts remaining after this one.
        remaining: u32,
    },
    /// An evaluator invocation's attempt timed out.
    #[serde(rename = "evaluator.timeout")]
    EvaluatorTimeout {
        /// Job this event belongs to.
        job_id: JobId,
        /// Evaluator id.
        evaluator_name: String,
        /// Per-attempt timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },
    /// Curation began for one issue type.
    #[serde(rename = "curation.started")]
    CurationStarted {
        /// Job this event belongs to.
        job_id: JobId,
        /// Issue type curated.
        issue_type: IssueType,
    },
    /// Curation finished for one issue type.
    #[serde(rename = "curation.completed")]
    CurationCompleted {
        /// Job this event belongs to.
        job_id: JobId,
        /// Issue type curated.
        issue_type: IssueType,
        /// Issues selected by curation.
        selected: usize,
    },
    /// The job reached its terminal success state. Always the last event
    /// published on a job (`spec.md` §4.11, §8 invariant).
    #[serde(rename = "job.completed")]
    JobCompleted {
        /// Job this event belongs to.
        job_id: JobId,
        /// Final progress percentage (always 100).
        percentage: u8,
    },
    /// The job reached its terminal failure state. Always the last event
    /// published on a job.
    #[serde(rename = "job.failed")]
    JobFailed {
        /// Job this event belongs to.
        job_id: JobId,
        /// Human-readable failure message.
        message: String,
        /// Machine-readable category code.
        code: String,
        /// Optional structured detail.
        details: Option<serde_json::Value>,
    },
    /// A remediation pipeline step started.
    #[serde(rename = "remediation.step.started")]
    RemediationStepStarted {
        /// Job this event belongs to.
        job_id: JobId,
        /// Which step started.
        step: RemediationStep,
    },
    /// A remediation pipeline step finished.
    #[serde(rename = "remediation.step.completed")]
    RemediationStepCompleted {
        /// Job this event belongs to.
        job_id: JobId,
        /// Which step finished.
        step: RemediationStep,
    },
    /// Cumulative remediation totals, emitted after each AI invocation
    /// (`spec.md` §4.10 progress events note).
    #[serde(rename = "remediation.progress")]
    RemediationProgress {
        /// Job this event belongs to.
        job_id: JobId,
        /// Total wall-clock duration so far, in milliseconds.
        duration_ms: u64,
        /// Total cost so far, in USD.
        cost_usd: f64,
        /// Total tokens consumed so far.
        tokens: u64,
        /// Phases completed so far.
        completed_phases: u32,
        /// Total phases in this remediation run.
        total_phases: u32,
    },
}

impl DomainEvent {
    /// Job id this event belongs to, regardless of variant.
    #[must_use]
    pub fn job_id(&self) -> JobId {
        match self {
            Self::JobStarted { job_id }
            | Self::CloneStarted { job_id }
            | Self::CloneCompleted { job_id, .. }
            | Self::CloneWarning { job_id, .. }
            | Self::DiscoveryStarted { job_id }
            | Self::DiscoveryCompleted { job_id, .. }
            | Self::ContextCloc { job_id, .. }
            | Self::ContextFolders { job_id, .. }
            | Self::ContextAnalysis { job_id, .. }
            | Self::ContextWarning { job_id, .. }
            | Self::FileStarted { job_id, .. }
            | Self::FileCompleted { job_id, .. }
            | Self::EvaluatorProgress { job_id, .. }
            | Self::EvaluatorCompleted { job_id, .. }
            | Self::EvaluatorRetry { job_id, .. }
            | Self::EvaluatorTimeout { job_id, .. }
            | Self::CurationStarted { job_id, .. }
            | Self::CurationCompleted { job_id, .. }
            | Self::JobCompleted { job_id, .. }
            | Self::JobFailed { job_id, .. }
            | Self::RemediationStepStarted { job_id, .. }
            | Self::RemediationStepCompleted { job_id, .. }
            | Self::RemediationProgress { job_id, .. } => *job_id,
        }
    }

    /// Whether this event is one of the two terminal events a job ever
    /// publishes exactly one of, as its last event (`spec.md` §4.11, §8).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::JobCompleted { .. } | Self::JobFailed { .. })
    }

    /// The `event:<name>` line's value for the SSE wire format
    /// (`spec.md` §6.1): the same string serde uses for the `type` tag.
    #[must_use]
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::JobStarted { .. } => "job.started",
            Self::CloneStarted { .. } => "clone.started",
            Self::CloneCompleted { .. } => "clone.completed",
            Self::CloneWarning { .. } => "clone.warning",
            Self::DiscoveryStarted { .. } => "discovery.started",
            Self::DiscoveryCompleted { .. } => "discovery.completed",
            Self::ContextCloc { .. } => "context.cloc",
            Self::ContextFolders { .. } => "context.folders",
            Self::ContextAnalysis { .. } => "context.analysis",
            Self::ContextWarning { .. } => "context.warning",
            Self::FileStarted { .. } => "file.started",
            Self::FileCompleted { .. } => "file.completed",
            Self::EvaluatorProgress { .. } => "evaluator.progress",
            Self::EvaluatorCompleted { .. } => "evaluator.completed",
            Self::EvaluatorRetry { .. } => "evaluator.retry",
            Self::EvaluatorTimeout { .. } => "evaluator.timeout",
            Self::CurationStarted { .. } => "curation.started",
            Self::CurationCompleted { .. } => "curation.completed",
            Self::JobCompleted { .. } => "job.completed",
            Self::JobFailed { .. } => "job.failed",
            Self::RemediationStepStarted { .. } => "remediation.step.started",
            Self::RemediationStepCompleted { .. } => "remediation.step.completed",
            Self::RemediationProgress { .. } => "remediation.progress",
        }
    }
}

/// The envelope every event is wrapped in on the wire
/// (`spec.md` §6.1: `jobId`, `timestamp`, and a type-specific `data` object).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Job this event belongs to, duplicated from the inner event for
    /// convenient client-side filtering.
    pub job_id: JobId,
    /// When the event was published.
    pub timestamp: DateTime<Utc>,
    /// The event itself.
    #[serde(flatten)]
    pub event: DomainEvent,
}

impl EventEnvelope {
    /// Wrap an event with the current time.
    #[must_use]
    pub fn new(event: DomainEvent) -> Self {
        Self {
            job_id: event.job_id(),
            timestamp: Utc::now(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_name_matches_serde_tag() {
        let job_id = JobId::from_name("job-events-test");
        let event = DomainEvent::JobCompleted { job_id, percentage: 100 };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], "job.completed");
        assert_eq!(event.wire_name(), "job.completed");
    }

    #[test]
    fn job_completed_and_failed_are_terminal() {
        let job_id = JobId::from_name("job-events-test");
        assert!(DomainEvent::JobCompleted { job_id, percentage: 100 }.is_terminal());
        assert!(DomainEvent::JobFailed {
            job_id,
            message: "boom".to_owned(),
            code: "INTERNAL".to_owned(),
            details: None,
        }
        .is_terminal());
        assert!(!DomainEvent::JobStarted { job_id }.is_terminal());
    }

    #[test]
    fn job_id_accessor_covers_every_variant() {
        let job_id = JobId::from_name("job-events-test");
        let event = DomainEvent::EvaluatorRetry {
            job_id,
            evaluator_name: "eval-A".to_owned(),
            attempt: 1,
            max: 3,
            error: "timed out".to_owned(),
            remaining: 2,
        };
        assert_eq!(event.job_id(), job_id);
    }
}
