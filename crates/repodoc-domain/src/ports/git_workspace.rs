//! The Git Workspace port: clone, diff, and reset a working copy
//! (`spec.md` §4.2, L2).

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;

/// Where to pin a fresh clone.
#[derive(Debug, Clone, Default)]
pub struct CloneSpec {
    /// Branch to check out after cloning, if not the default branch.
    pub branch: Option<String>,
    /// Exact commit to check out after cloning, if pinned.
    pub commit_sha: Option<String>,
}

/// An ephemeral checkout owned by exactly one pipeline phase
/// (`spec.md` §3 glossary: "Clone workspace").
///
/// Never shared between jobs. `release` is idempotent; call it on every
/// exit path, including error paths, so the temp directory is never
/// leaked.
pub struct ClonedWorkspace {
    path: PathBuf,
}

impl ClonedWorkspace {
    /// Wrap an already-cloned directory.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The working directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Git operations needed by the orchestrators, implemented over the `git`
/// CLI (`spec.md` §4.2).
#[async_trait]
pub trait GitWorkspace: Send + Sync {
    /// Clone `url` into an isolated temp directory under a managed root,
    /// then check out `spec.branch`/`spec.commit_sha` if given. Clone
    /// failure is fatal to the job (`spec.md` §7: `REPO_ERROR`).
    async fn clone(&self, url: &str, spec: &CloneSpec) -> Result<ClonedWorkspace>;

    /// Release a workspace, deleting its directory tree. Idempotent.
    async fn release(&self, workspace: ClonedWorkspace) -> Result<()>;

    /// `true` iff `git status --porcelain` reports no changes (required
    /// before mutating a non-clone workspace, `spec.md` §4.10 step 2).
    async fn is_clean(&self, cwd: &Path) -> Result<bool>;

    /// Stage all changes, including untracked files, and produce a
    /// unified diff of the index against HEAD. New files appear as
    /// full-add hunks.
    async fn capture_diff(&self, cwd: &Path) -> Result<String>;

    /// Unstage, revert tracked files, and remove untracked files and
    /// directories, leaving the tree byte-identical to HEAD. Failure is
    /// logged but does not abort the caller (`spec.md` §4.2 failure model:
    /// "reset failure is logged but does not abort").
    async fn reset(&self, cwd: &Path) -> Result<()>;
}
