//! The persistence port for completed evaluations and remediations
//! (`spec.md` §6.2 persisted state layout).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{EvaluationResult, PhaseStatsBlock};
use crate::value_objects::{EvaluationId, RemediationId};

use crate::error::Result;

/// A persisted evaluation, binary-compatible with the storage contract in
/// `spec.md` §6.2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    /// Stored identifier.
    pub id: EvaluationId,
    /// Repository URL or local path that was evaluated.
    pub repository_url: String,
    /// Branch checked out, if not the default.
    pub git_branch: Option<String>,
    /// Commit SHA checked out, if pinned.
    pub git_commit_sha: Option<String>,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
    /// The evaluation's findings.
    pub result: EvaluationResult,
    /// Total cost across every provider invocation.
    pub cost_usd: f64,
    /// Total wall-clock duration across every provider invocation.
    pub duration_ms: u64,
}

/// A persisted remediation, binary-compatible with the storage contract in
/// `spec.md` §6.2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationRecord {
    /// Stored identifier.
    pub id: RemediationId,
    /// Evaluation this remediation was run against.
    pub evaluation_id: EvaluationId,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
    /// Lifecycle status at write time, as a job-status code string.
    pub status: String,
    /// Full unified diff, present once the run completed.
    pub full_patch: Option<String>,
    /// Per-file change summary, present once the run completed.
    pub file_changes: Option<Vec<crate::entities::FileChange>>,
    /// Sum of additions across `file_changes`.
    pub total_additions: usize,
    /// Sum of deletions across `file_changes`.
    pub total_deletions: usize,
    /// Structured action summary text, present once the run completed.
    pub summary: Option<String>,
    /// Per-phase cost/duration/token accounting.
    pub phase_stats: Option<PhaseStatsBlock>,
}

/// Durable storage for evaluation and remediation records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist an evaluation record, returning its assigned id.
    async fn save_evaluation(&self, record: EvaluationRecord) -> Result<EvaluationId>;

    /// Load a previously persisted evaluation by id.
    async fn load_evaluation(&self, id: EvaluationId) -> Result<Option<EvaluationRecord>>;

    /// Persist a remediation record, returning its assigned id.
    async fn save_remediation(&self, record: RemediationRecord) -> Result<RemediationId>;

    /// Load a previously persisted remediation by id.
    async fn load_remediation(&self, id: RemediationId) -> Result<Option<RemediationRecord>>;
}
