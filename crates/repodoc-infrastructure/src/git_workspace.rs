//! `GitWorkspace` over the `git` CLI (`SPEC_FULL.md` §4.2): every operation
//! is a bounded subprocess invocation, never `git2`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use repodoc_domain::error::{Error, Result};
use repodoc_domain::ports::{CloneSpec, ClonedWorkspace, GitWorkspace};
use tokio::process::Command;

/// `GitWorkspace` implementation that shells out to the `git` binary found
/// on `PATH`, cloning into a fresh temporary directory per job.
pub struct CliGitWorkspace;

impl CliGitWorkspace {
    /// Build a workspace backed by the system `git` binary.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for CliGitWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GitWorkspace for CliGitWorkspace {
    async fn clone(&self, url: &str, spec: &CloneSpec) -> Result<ClonedWorkspace> {
        let dir = tempfile::tempdir().map_err(Error::from)?.into_path();

        let mut args = vec!["clone".to_owned(), "--quiet".to_owned()];
        if let Some(branch) = &spec.branch {
            args.push("--branch".to_owned());
            args.push(branch.clone());
        }
        args.push(url.to_owned());
        args.push(dir.display().to_string());

        run_git(None, &args).await?;

        if let Some(commit_sha) = &spec.commit_sha {
            run_git(Some(&dir), &["checkout".to_owned(), "--quiet".to_owned(), commit_sha.clone()]).await?;
        }

        Ok(ClonedWorkspace::new(dir))
    }

    async fn release(&self, workspace: ClonedWorkspace) -> Result<()> {
        let path = workspace.path().to_path_buf();
        tokio::task::spawn_blocking(move || std::fs::remove_dir_all(&path))
            .await
            .map_err(|err| Error::internal(err.to_string()))?
            .ok();
        Ok(())
    }

    async fn is_clean(&self, cwd: &Path) -> Result<bool> {
        let output = run_git(Some(cwd), &["status".to_owned(), "--porcelain".to_owned()]).await?;
        Ok(output.trim().is_empty())
    }

    async fn capture_diff(&self, cwd: &Path) -> Result<String> {
        run_git(Some(cwd), &["diff".to_owned(), "--no-color".to_owned(), "HEAD".to_owned()]).await
    }

    async fn reset(&self, cwd: &Path) -> Result<()> {
        run_git(Some(cwd), &["reset".to_owned(), "--hard".to_owned(), "HEAD".to_owned()]).await?;
        run_git(Some(cwd), &["clean".to_owned(), "-fdx".to_owned()]).await?;
        Ok(())
    }
}

async fn run_git(cwd: Option<&Path>, args: &[String]) -> Result<String> {
    let mut command = Command::new("git");
    command.args(args);
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }

    let output = command.output().await.map_err(|err| Error::Subprocess {
        command: "git".to_owned(),
        stderr: err.to_string(),
    })?;

    if !output.status.success() {
        return Err(Error::Subprocess {
            command: format!("git {}", args.join(" ")),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        std::process::Command::new("git").arg("init").arg("--quiet").current_dir(dir.path()).status().unwrap();
        std::process::Command::new("git")
            .args(["config", "user.email", "test@example.com"])
            .current_dir(dir.path())
            .status()
            .unwrap();
        std::process::Command::new("git")
            .args(["config", "user.name", "test"])
            .current_dir(dir.path())
            .status()
            .unwrap();
        std::fs::write(dir.path().join("AGENTS.md"), "hello\n").unwrap();
        std::process::Command::new("git").args(["add", "."]).current_dir(dir.path()).status().unwrap();
        std::process::Command::new("git")
            .args(["commit", "--quiet", "-m", "init"])
            .current_dir(dir.path())
            .status()
            .unwrap();
        dir
    }

    #[tokio::test]
    async fn is_clean_detects_modification() {
        let repo = init_repo();
        let workspace = CliGitWorkspace::new();
        assert!(workspace.is_clean(repo.path()).await.unwrap());

        std::fs::write(repo.path().join("AGENTS.md"), "changed\n").unwrap();
        assert!(!workspace.is_clean(repo.path()).await.unwrap());
    }

    #[tokio::test]
    async fn capture_diff_and_reset_round_trip() {
        let repo = init_repo();
        let workspace = CliGitWorkspace::new();

        std::fs::write(repo.path().join("AGENTS.md"), "changed\n").unwrap();
        let diff = workspace.capture_diff(repo.path()).await.unwrap();
        assert!(diff.contains("changed"));

        workspace.reset(repo.path()).await.unwrap();
        assert!(workspace.is_clean(repo.path()).await.unwrap());
    }
}
