//! The `Job` aggregate: the unit the Job Manager admits, runs, and reports on.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::evaluation::EvaluationResult;
use crate::entities::remediation::RemediationResult;
use crate::error::ErrorCategory;
use crate::value_objects::{EvaluationMode, EvaluatorFilter, JobId};

/// The bounded log ring size carried by every job (`spec.md` §3).
pub const JOB_LOG_RING_CAPACITY: usize = 200;

/// Lifecycle state of a job (`spec.md` §3 and §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Admitted to the queue, not yet picked up by a worker.
    Queued,
    /// A worker is actively driving this job's pipeline.
    Running,
    /// The pipeline finished and produced a result.
    Completed,
    /// The pipeline failed before producing a result.
    Failed,
    /// The job was cancelled before or during execution.
    Cancelled,
}

/// What kind of pipeline a job drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Drives the Evaluation Orchestrator.
    Evaluation,
    /// Drives the Remediation Orchestrator.
    Remediation,
}

/// The request that admitted a job, carried unmodified for the job's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    /// Git URL or local filesystem path of the target repository.
    pub repository_url: String,
    /// Branch to check out after cloning, if not the default branch.
    #[serde(default)]
    pub branch: Option<String>,
    /// Exact commit to check out after cloning, if pinned.
    #[serde(default)]
    pub commit_sha: Option<String>,
    /// Evaluator ids to run; empty means "use `evaluator_filter`".
    #[serde(default)]
    pub selected_evaluators: Vec<String>,
    /// Coarse evaluator selection when `selected_evaluators` is empty.
    #[serde(default)]
    pub evaluator_filter: EvaluatorFilter,
    /// Name of the AI provider to invoke.
    pub provider: String,
    /// Maximum in-flight evaluator invocations.
    pub concurrency: u32,
    /// Per-provider-invocation timeout in milliseconds.
    pub timeout_ms: u64,
    /// Evaluation fan-out strategy.
    #[serde(default)]
    pub mode: EvaluationMode,
}

/// A single entry in a job's bounded log ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// Log level, matching `tracing` level names.
    pub level: String,
    /// Human-readable message.
    pub message: String,
}

/// A bounded, append-only ring of log entries; overflow drops the oldest
/// entry (`spec.md` §3, §5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogRing {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl LogRing {
    /// Create an empty ring with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Append an entry, dropping the oldest one if the ring is full.
    pub fn push(&mut self, entry: LogEntry) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// All entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> &VecDeque<LogEntry> {
        &self.entries
    }

    /// Number of entries currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ring holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Point-in-time progress of a running evaluation job (`spec.md` §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// File currently being evaluated, if any.
    pub current_file: Option<String>,
    /// Evaluator currently running, if any.
    pub current_evaluator: Option<String>,
    /// Files fully processed so far.
    pub completed_files: u32,
    /// Total files targeted by this job.
    pub total_files: u32,
    /// Evaluator invocations completed so far.
    pub completed_evaluators: u32,
    /// Total evaluator invocations targeted by this job.
    pub total_evaluators: u32,
}

impl ProgressSnapshot {
    /// Integer completion percentage, `0` when nothing is targeted yet.
    #[must_use]
    pub fn percentage(&self) -> u8 {
        if self.total_evaluators == 0 {
            return 0;
        }
        let pct = (f64::from(self.completed_evaluators) / f64::from(self.total_evaluators)) * 100.0;
        pct.round().clamp(0.0, 100.0) as u8
    }
}

/// Terminal error detail attached to a failed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobError {
    /// Human-readable failure message.
    pub message: String,
    /// Machine-readable category code.
    pub code: String,
    /// Optional structured detail.
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

impl JobError {
    /// Build a [`JobError`] from a domain error category and message.
    #[must_use]
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: category.code().to_owned(),
            details: None,
        }
    }
}

/// The final payload of a completed job, variant per job kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JobResult {
    /// Result of an Evaluation Orchestrator run.
    Evaluation(Box<EvaluationResult>),
    /// Result of a Remediation Orchestrator run.
    Remediation(Box<RemediationResult>),
}

/// A job tracked by the Job Manager end to end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Opaque job identifier.
    pub id: JobId,
    /// Which pipeline this job drives.
    pub kind: JobKind,
    /// The admitted request, immutable for the job's lifetime.
    pub request: JobRequest,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// When the job was admitted.
    pub created_at: DateTime<Utc>,
    /// When a worker picked the job up.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Repository URL, duplicated from the request for quick listing.
    pub repository_url: String,
    /// Latest progress snapshot, updated only while `status == Running`.
    pub progress: ProgressSnapshot,
    /// Bounded log ring.
    pub log: LogRing,
    /// Present once `status == Completed`.
    pub result: Option<JobResult>,
    /// Present once `status == Failed`.
    pub error: Option<JobError>,
}

impl Job {
    /// Construct a freshly admitted job in the `Queued` state.
    #[must_use]
    pub fn new(kind: JobKind, request: JobRequest) -> Self {
        let repository_url = request.repository_url.clone();
        Self {
            id: JobId::new(),
            kind,
            request,
            status: JobStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            repository_url,
            progress: ProgressSnapshot::default(),
            log: LogRing::new(JOB_LOG_RING_CAPACITY),
            result: None,
            error: None,
        }
    }

    /// Whether the job has reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}
