//! Unified-diff entities shared by `captureDiff`'s parser and remediation
//! results.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Status of a file within a unified diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum DiffStatus {
    /// The file did not exist at the base revision.
    #[display("added")]
    Added,
    /// The file existed at both revisions with different content.
    #[display("modified")]
    Modified,
    /// The file existed at the base revision and was removed.
    #[display("deleted")]
    Deleted,
}

/// One file's slice of a unified diff, plus the summary counts
/// `spec.md` §4.2 requires the parser to compute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDiff {
    /// Path relative to the repository root (the `b/` side of the diff header).
    pub path: String,
    /// Whether the file was added, modified, or deleted.
    pub status: DiffStatus,
    /// Number of `+` lines inside hunks, excluding the `+++` header.
    pub additions: usize,
    /// Number of `-` lines inside hunks, excluding the `---` header.
    pub deletions: usize,
    /// The full `diff --git ...` segment for this file.
    pub patch: String,
}

/// The complete parsed result of a unified diff.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedDiff {
    /// One entry per changed path.
    pub files: Vec<FileDiff>,
}

impl ParsedDiff {
    /// Total additions across all files.
    #[must_use]
    pub fn total_additions(&self) -> usize {
        self.files.iter().map(|f| f.additions).sum()
    }

    /// Total deletions across all files.
    #[must_use]
    pub fn total_deletions(&self) -> usize {
        self.files.iter().map(|f| f.deletions).sum()
    }
}
