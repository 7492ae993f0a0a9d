//! Remediation result entities (`spec.md` §3, §4.10).

use serde::{Deserialize, Serialize};

use crate::entities::diff::DiffStatus;

/// Per-phase cost/duration/token accounting for one plan or execute call
/// (`spec.md` §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhaseStats {
    /// Prompt text sent to the provider for this phase.
    pub prompt_text: String,
    /// Wall-clock duration of the phase's provider call, in milliseconds.
    pub duration_ms: u64,
    /// Cost in USD of the phase's provider call.
    pub cost_usd: f64,
    /// Input + output tokens consumed by the phase's provider call.
    pub tokens: u64,
}

/// Stats for every phase of the plan/execute pipeline, present once each
/// corresponding phase has run (`spec.md` §4.10 steps 4-7, 9-10).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhaseStatsBlock {
    /// Phase 1: errors plan.
    pub error_plan: Option<PhaseStats>,
    /// Phase 2: errors execute.
    pub error_execute: Option<PhaseStats>,
    /// Phase 3: suggestions plan.
    pub suggestion_plan: Option<PhaseStats>,
    /// Phase 4: suggestions execute.
    pub suggestion_execute: Option<PhaseStats>,
}

/// Outcome recorded for one input issue after a remediation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    /// The issue's underlying problem was fixed.
    Fixed,
    /// New content was added to address the issue (e.g. a missing section).
    Added,
    /// The provider declined or was unable to act on the issue.
    Skipped,
}

/// The shape of the content the provider produced for one action, when a
/// target-agent-specific format applies (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionOutputType {
    /// Plain documentation prose.
    Standard,
    /// A target-agent skill/command file.
    Skill,
    /// Unclassified output.
    Generic,
}

/// One entry in the structured action summary (`spec.md` §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSummary {
    /// Index of the input issue this action addresses, remapped to a global
    /// index across batches (`spec.md` §4.10 batching note).
    pub issue_index: usize,
    /// What happened to the issue.
    pub status: ActionStatus,
    /// File the action touched, when applicable.
    pub file: Option<String>,
    /// Shape of the produced content, when applicable.
    pub output_type: Option<ActionOutputType>,
    /// One-line human-readable summary of the action.
    pub short_summary: String,
}

/// Per-file changes captured in the final diff (`spec.md` §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    /// Path relative to the repository root.
    pub path: String,
    /// Added, modified, or deleted.
    pub status: DiffStatus,
    /// Lines added.
    pub additions: usize,
    /// Lines removed.
    pub deletions: usize,
    /// This file's slice of `full_patch`.
    pub patch: String,
}

/// The complete output of a remediation run (`spec.md` §3, §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationResult {
    /// Unified diff text across every touched file, captured after the
    /// final phase and before `reset` (`spec.md` §4.10 step 10).
    pub full_patch: String,
    /// Per-file slices of `full_patch`, with status and line counts.
    pub file_changes: Vec<FileChange>,
    /// Sum of `additions` across `file_changes`.
    pub total_additions: usize,
    /// Sum of `deletions` across `file_changes`.
    pub total_deletions: usize,
    /// Cost/duration/token accounting per plan/execute phase.
    pub phase_stats: PhaseStatsBlock,
    /// One entry per input issue describing what happened to it.
    pub action_summary: Vec<ActionSummary>,
    /// Diff captured after phase 2 (errors executed), before suggestions
    /// build on top (`spec.md` §4.10 step 6).
    pub error_fix_diff: String,
    /// Plan text produced by phase 1 (errors plan).
    pub error_plan_text: String,
    /// Plan text produced by phase 3 (suggestions plan).
    pub suggestion_plan_text: String,
}

impl RemediationResult {
    /// Sum of every phase's cost, used for the job's aggregate cost total.
    #[must_use]
    pub fn total_cost_usd(&self) -> f64 {
        [
            &self.phase_stats.error_plan,
            &self.phase_stats.error_execute,
            &self.phase_stats.suggestion_plan,
            &self.phase_stats.suggestion_execute,
        ]
        .iter()
        .filter_map(|phase| phase.as_ref())
        .map(|phase| phase.cost_usd)
        .sum()
    }

    /// Sum of every phase's duration, used for the job's aggregate duration
    /// total.
    #[must_use]
    pub fn total_duration_ms(&self) -> u64 {
        [
            &self.phase_stats.error_plan,
            &self.phase_stats.error_execute,
            &self.phase_stats.suggestion_plan,
            &self.phase_stats.suggestion_execute,
        ]
        .iter()
        .filter_map(|phase| phase.as_ref())
        .map(|phase| phase.duration_ms)
        .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(cost: f64, duration: u64) -> PhaseStats {
        PhaseStats {
            prompt_text: "plan".to_owned(),
            duration_ms: duration,
            cost_usd: cost,
            tokens: 100,
        }
    }

    #[test]
    fn total_cost_and_duration_sum_present_phases_only() {
        let result = RemediationResult {
            full_patch: String::new(),
            file_changes: Vec::new(),
            total_additions: 0,
            total_deletions: 0,
            phase_stats: PhaseStatsBlock {
                error_plan: Some(stats(0.10, 1000)),
                error_execute: Some(stats(0.20, 2000)),
                suggestion_plan: None,
                suggestion_execute: None,
            },
            action_summary: Vec::new(),
            error_fix_diff: String::new(),
            error_plan_text: String::new(),
            suggestion_plan_text: String::new(),
        };
        assert!((result.total_cost_usd() - 0.30).abs() < f64::EPSILON);
        assert_eq!(result.total_duration_ms(), 3000);
    }

    #[test]
    fn action_summary_remaps_batch_index_to_global() {
        let batch_index = 2usize;
        let batch_size = 50usize;
        let local_index = 3usize;
        let action = ActionSummary {
            issue_index: batch_index * batch_size + local_index,
            status: ActionStatus::Fixed,
            file: Some("AGENTS.md".to_owned()),
            output_type: Some(ActionOutputType::Standard),
            short_summary: "clarified setup steps".to_owned(),
        };
        assert_eq!(action.issue_index, 103);
    }
}
