//! Unified-diff parsing (`spec.md` §4.2).
//!
//! Splits a `git diff`-style blob on `diff --git ` boundaries, then per
//! segment extracts the path, add/delete status, and hunk line counts.

use repodoc_domain::entities::{DiffStatus, FileDiff, ParsedDiff};

const SEGMENT_MARKER: &str = "diff --git ";

/// Parse the output of `git diff` (or equivalent) into one [`FileDiff`] per
/// changed path. Tolerates multi-hunk, multi-file diffs; preserves the full
/// per-file diff text verbatim.
#[must_use]
pub fn parse_unified_diff(patch: &str) -> ParsedDiff {
    let mut files = Vec::new();
    let mut segments = split_segments(patch);
    // Re-attach the marker dropped by the split, since each file's `patch`
    // field must round-trip the original segment text.
    for segment in &mut segments {
        *segment = format!("{SEGMENT_MARKER}{segment}");
    }

    for segment in segments {
        if let Some(file_diff) = parse_segment(&segment) {
            files.push(file_diff);
        }
    }

    ParsedDiff { files }
}

fn split_segments(patch: &str) -> Vec<String> {
    patch
        .split(SEGMENT_MARKER)
        .skip(1) // text before the first marker is never part of a file segment
        .map(str::to_owned)
        .collect()
}

fn parse_segment(segment: &str) -> Option<FileDiff> {
    let path = extract_path(segment)?;
    let status = extract_status(segment);
    let (additions, deletions) = count_hunk_lines(segment);

    Some(FileDiff {
        path,
        status,
        additions,
        deletions,
        patch: segment.to_owned(),
    })
}

/// The header line reads `diff --git a/<path> b/<path>`; take the `b/` side
/// so renames and deletes still resolve to the post-image path.
fn extract_path(segment: &str) -> Option<String> {
    let header = segment.lines().next()?;
    let b_marker = " b/";
    let idx = header.rfind(b_marker)?;
    let path = &header[idx + b_marker.len()..];
    Some(path.trim().to_owned())
}

fn extract_status(segment: &str) -> DiffStatus {
    if segment.lines().any(|line| line.starts_with("new file mode")) {
        DiffStatus::Added
    } else if segment.lines().any(|line| line.starts_with("deleted file mode")) {
        DiffStatus::Deleted
    } else {
        DiffStatus::Modified
    }
}

fn count_hunk_lines(segment: &str) -> (usize, usize) {
    let mut additions = 0;
    let mut deletions = 0;
    let mut in_hunk = false;

    for line in segment.lines() {
        if line.starts_with("@@") {
            in_hunk = true;
            continue;
        }
        if !in_hunk {
            continue;
        }
        if line.starts_with("+++") || line.starts_with("---") {
            continue;
        }
        if line.starts_with('+') {
            additions += 1;
        } else if line.starts_with('-') {
            deletions += 1;
        }
    }

    (additions, deletions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_modified_file() {
        let patch = "diff --git a/AGENTS.md b/AGENTS.md\n\
index 1111111..2222222 100644\n\
--- a/AGENTS.md\n\
+++ b/AGENTS.md\n\
@@ -1,2 +1,3 @@\n\
 # Title\n\
-old line\n\
+new line\n\
+added line\n";
        let parsed = parse_unified_diff(patch);
        assert_eq!(parsed.files.len(), 1);
        let file = &parsed.files[0];
        assert_eq!(file.path, "AGENTS.md");
        assert_eq!(file.status, DiffStatus::Modified);
        assert_eq!(file.additions, 2);
        assert_eq!(file.deletions, 1);
        assert!(file.patch.starts_with("diff --git a/AGENTS.md b/AGENTS.md"));
    }

    #[test]
    fn parses_added_file() {
        let patch = "diff --git a/NEW.md b/NEW.md\n\
new file mode 100644\n\
index 0000000..1111111\n\
--- /dev/null\n\
+++ b/NEW.md\n\
@@ -0,0 +1,2 @@\n\
+line one\n\
+line two\n";
        let parsed = parse_unified_diff(patch);
        assert_eq!(parsed.files[0].status, DiffStatus::Added);
        assert_eq!(parsed.files[0].additions, 2);
        assert_eq!(parsed.files[0].deletions, 0);
    }

    #[test]
    fn parses_deleted_file() {
        let patch = "diff --git a/OLD.md b/OLD.md\n\
deleted file mode 100644\n\
index 1111111..0000000\n\
--- a/OLD.md\n\
+++ /dev/null\n\
@@ -1,1 +0,0 @@\n\
-gone\n";
        let parsed = parse_unified_diff(patch);
        assert_eq!(parsed.files[0].status, DiffStatus::Deleted);
        assert_eq!(parsed.files[0].deletions, 1);
    }

    #[test]
    fn parses_multi_file_multi_hunk_diff() {
        let patch = "diff --git a/A.md b/A.md\n\
--- a/A.md\n\
+++ b/A.md\n\
@@ -1,1 +1,1 @@\n\
-a\n\
+b\n\
@@ -10,1 +10,1 @@\n\
-c\n\
+d\n\
diff --git a/B.md b/B.md\n\
--- a/B.md\n\
+++ b/B.md\n\
@@ -1,1 +1,1 @@\n\
-e\n\
+f\n";
        let parsed = parse_unified_diff(patch);
        assert_eq!(parsed.files.len(), 2);
        assert_eq!(parsed.files[0].additions, 2);
        assert_eq!(parsed.files[0].deletions, 2);
        assert_eq!(parsed.files[1].path, "B.md");
        assert_eq!(parsed.total_additions(), 3);
        assert_eq!(parsed.total_deletions(), 3);
    }
}
