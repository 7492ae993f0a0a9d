//! Small, immutable value types shared across entities.

mod ids;

pub use ids::{BatchId, EvaluationId, JobId, RemediationId};

/// Evaluation fan-out strategy (`spec.md` §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationMode {
    /// One evaluator pass runs once across all target files.
    Unified,
    /// One evaluator pass runs per target file.
    Independent,
}

impl Default for EvaluationMode {
    fn default() -> Self {
        Self::Independent
    }
}

/// Which subset of evaluators to run, named in `spec.md` §6's environment inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvaluatorFilter {
    /// Run every registered evaluator.
    All,
    /// Run only evaluators that produce error-type issues.
    ErrorsOnly,
    /// Run only evaluators that produce suggestion-type issues.
    SuggestionsOnly,
}

impl Default for EvaluatorFilter {
    fn default() -> Self {
        Self::All
    }
}

/// Target AI-assistant convention for remediation output (`spec.md` GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetAgent {
    /// Plain `AGENTS.md` convention.
    AgentsMd,
    /// Claude Code's `CLAUDE.md` convention.
    ClaudeCode,
    /// GitHub Copilot's instructions convention.
    GithubCopilot,
    /// Cursor's rules convention.
    Cursor,
}
