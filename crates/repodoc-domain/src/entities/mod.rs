//! Domain entities: the types that flow through evaluation and remediation.

pub mod colocated;
pub mod diff;
pub mod evaluation;
pub mod issue;
pub mod job;
pub mod remediation;

pub use colocated::{is_reference_pointer, reference_pointer_target, ColocatedPair, MERGE_DELIMITER};
pub use diff::{DiffStatus, FileDiff, ParsedDiff};
pub use evaluation::{
    CurationBlock, CurationOutput, EvaluationBody, EvaluationMetadata, EvaluationResult,
    EvaluatorResult, FailedEvaluator, FailureCategory, FileEvaluations, LineCountSummary,
    ProjectContext, UsageTotals,
};
pub use issue::{severity_bucket, FileLocation, ImpactLevel, Issue, IssueCommon, Location, SeverityBucket};
pub use job::{
    Job, JobError, JobKind, JobRequest, JobResult, JobStatus, LogEntry, LogRing, ProgressSnapshot,
    JOB_LOG_RING_CAPACITY,
};
pub use remediation::{
    ActionOutputType, ActionStatus, ActionSummary, FileChange, PhaseStats, PhaseStatsBlock,
    RemediationResult,
};
