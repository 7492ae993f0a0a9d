//! Colocated AGENTS.md/CLAUDE.md-class file pairs (`spec.md` §3, §4.4).

use serde::{Deserialize, Serialize};

/// Two documentation files sharing a directory, where one (`canonical`, e.g.
/// `AGENTS.md`) is the source of truth and the other (`alias`, e.g.
/// `CLAUDE.md`) either duplicates it or already points at it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColocatedPair {
    /// Directory containing both files, relative to the repository root.
    pub directory: String,
    /// Path to the canonical (AGENTS.md-class) file.
    pub canonical_path: String,
    /// Path to the alias (CLAUDE.md-class) file.
    pub alias_path: String,
    /// True when `alias_path` already contains only a reference pointer to
    /// `canonical_path`.
    pub already_consolidated: bool,
}

/// The exact marker delimiting content merged in from a consolidated alias
/// (`spec.md` §4.7 step 3).
pub const MERGE_DELIMITER: &str = "<!-- Merged from CLAUDE.md -->";

/// Whether `content` consists of nothing but a single `@PATH` reference
/// pointer, optionally `./`-prefixed (`spec.md` §4.4, §8 round-trip laws).
///
/// `@X\n` and `@./X` are pointers; `@X\n extra` (trailing non-blank content)
/// is not.
#[must_use]
pub fn is_reference_pointer(content: &str) -> bool {
    let trimmed = content.trim();
    if !trimmed.starts_with('@') {
        return false;
    }
    // Exactly one non-blank line: the "@PATH" marker itself.
    let non_blank_lines: Vec<&str> = trimmed.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    non_blank_lines.len() == 1 && non_blank_lines[0] == trimmed
}

/// Extract the path a reference pointer targets, stripping a leading `./`.
#[must_use]
pub fn reference_pointer_target(content: &str) -> Option<String> {
    if !is_reference_pointer(content) {
        return None;
    }
    let trimmed = content.trim().trim_start_matches('@');
    Some(trimmed.trim_start_matches("./").to_owned())
}
