//! The line-count tool port used by the Context Analyzer (`spec.md` §4.3).

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

/// Total and per-language line counts for a directory tree.
#[derive(Debug, Clone, Default)]
pub struct LineCountReport {
    /// Total lines across every language.
    pub total_lines: u64,
    /// Per-language line counts, as reported by the tool.
    pub by_language: HashMap<String, u64>,
}

/// A `cloc`-class line-counting tool, invoked as a bounded subprocess.
/// Failure is non-fatal to the Context Analyzer (`spec.md` §4.3 step 1).
#[async_trait]
pub trait LineCounter: Send + Sync {
    /// Count lines under `root`, bounded by `timeout`.
    async fn count(&self, root: &Path, timeout: std::time::Duration) -> Result<LineCountReport>;
}
