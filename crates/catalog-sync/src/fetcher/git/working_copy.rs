//! Local git working copies driven through the git CLI.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command as TokioCommand;

use super::parse::{format_git_error, sparse_checkout_patterns};
use crate::error::{classify_git_error, GitError};

/// A shallow, single-branch clone tracking one remote branch.
#[derive(Debug, Clone)]
pub struct WorkingCopy {
    path: PathBuf,
    command_timeout: Duration,
}

impl WorkingCopy {
    pub fn new(path: impl Into<PathBuf>, command_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            command_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checks if the directory holds a git working copy.
    pub fn is_git_repo(&self) -> bool {
        self.path.join(".git").exists()
    }

    /// Whether sparse checkout is currently switched on.
    pub fn is_sparse(&self) -> bool {
        self.sparse_checkout_file().exists()
    }

    fn sparse_checkout_file(&self) -> PathBuf {
        self.path.join(".git").join("info").join("sparse-checkout")
    }

    /// Clones `branch` of `url` at depth 1.
    ///
    /// With a base path only that subtree is checked out. A failed clone
    /// leaves no directory behind.
    pub async fn clone_shallow(
        &self,
        url: &str,
        branch: &str,
        base_path: Option<&str>,
    ) -> Result<(), GitError> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| GitError::Operation(format!("Invalid clone target {}", self.path.display())))?;
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| GitError::Operation(format!("Failed to create {}: {}", parent.display(), e)))?;

        if self.path.exists() {
            // Leftover from an interrupted clone.
            remove_dir(&self.path).await?;
        }

        let target = self.path.to_string_lossy().to_string();
        let mut args = vec![
            "clone",
            "--depth",
            "1",
            "--single-branch",
            "--branch",
            branch,
        ];
        if base_path.is_some() {
            args.push("--no-checkout");
        }
        args.push("--");
        args.push(url);
        args.push(&target);

        let result = async {
            run_git_in(parent, &args, self.command_timeout).await?;
            if let Some(base) = base_path {
                self.enable_sparse_checkout(base).await?;
                self.run_git(&["read-tree", "-mu", "HEAD"]).await?;
            }
            Ok::<(), GitError>(())
        }
        .await;

        if result.is_err() && self.path.exists() {
            if let Err(e) = remove_dir(&self.path).await {
                log::warn!("Failed to remove partial clone: {}", e);
            }
        }

        result
    }

    /// Moves the working copy to the tip of the remote `branch`.
    ///
    /// Local changes and untracked files are discarded. The sparse-checkout
    /// patterns are rewritten every time because the reset repopulates the
    /// full tree.
    pub async fn update(
        &self,
        url: &str,
        branch: &str,
        base_path: Option<&str>,
    ) -> Result<(), GitError> {
        if !self.is_git_repo() {
            return Err(GitError::NotARepository(self.path.clone()));
        }

        self.run_git(&["remote", "set-url", "origin", url]).await?;
        self.run_git(&["fetch", "--depth", "1", "origin", branch]).await?;
        self.run_git(&["reset", "--hard", "FETCH_HEAD"]).await?;
        self.run_git(&["clean", "-ffd"]).await?;

        match base_path {
            Some(base) => {
                self.enable_sparse_checkout(base).await?;
                self.run_git(&["read-tree", "-mu", "HEAD"]).await?;
            }
            None => self.disable_sparse_checkout().await?,
        }

        Ok(())
    }

    /// Restricts the checkout to `base_path/*`.
    async fn enable_sparse_checkout(&self, base_path: &str) -> Result<(), GitError> {
        self.run_git(&["config", "core.sparseCheckout", "true"]).await?;
        self.write_sparse_patterns(&sparse_checkout_patterns(base_path))
            .await
    }

    /// Restores the full tree if an earlier fetch made the copy sparse.
    async fn disable_sparse_checkout(&self) -> Result<(), GitError> {
        if !self.is_sparse() {
            return Ok(());
        }

        self.write_sparse_patterns("/*\n").await?;
        self.run_git(&["read-tree", "-mu", "HEAD"]).await?;
        self.run_git(&["config", "core.sparseCheckout", "false"])
            .await?;

        let file = self.sparse_checkout_file();
        tokio::fs::remove_file(&file)
            .await
            .map_err(|e| GitError::Operation(format!("Failed to remove {}: {}", file.display(), e)))
    }

    async fn write_sparse_patterns(&self, patterns: &str) -> Result<(), GitError> {
        let file = self.sparse_checkout_file();
        if let Some(info_dir) = file.parent() {
            tokio::fs::create_dir_all(info_dir).await.map_err(|e| {
                GitError::Operation(format!("Failed to create {}: {}", info_dir.display(), e))
            })?;
        }
        tokio::fs::write(&file, patterns)
            .await
            .map_err(|e| GitError::Operation(format!("Failed to write {}: {}", file.display(), e)))
    }

    /// Runs a git command in the working copy.
    async fn run_git(&self, args: &[&str]) -> Result<Output, GitError> {
        run_git_in(&self.path, args, self.command_timeout).await
    }
}

/// Runs git in `dir`, failing on a non-zero exit or when `timeout` elapses.
async fn run_git_in(dir: &Path, args: &[&str], timeout: Duration) -> Result<Output, GitError> {
    let mut cmd = TokioCommand::new("git");
    cmd.current_dir(dir)
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    log::trace!("git {}", args.join(" "));

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| GitError::Timeout(timeout.as_secs()))?
        .map_err(|e| GitError::Spawn(e.to_string()))?;

    if output.status.success() {
        Ok(output)
    } else {
        Err(classify_git_error(&format_git_error(&output)))
    }
}

async fn remove_dir(path: &Path) -> Result<(), GitError> {
    tokio::fs::remove_dir_all(path)
        .await
        .map_err(|e| GitError::Operation(format!("Failed to remove {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_git_repo_false() {
        let dir = TempDir::new().unwrap();
        let copy = WorkingCopy::new(dir.path(), Duration::from_secs(30));
        assert!(!copy.is_git_repo());
        assert!(!copy.is_sparse());
    }

    #[tokio::test]
    async fn test_update_requires_repository() {
        let dir = TempDir::new().unwrap();
        let copy = WorkingCopy::new(dir.path(), Duration::from_secs(30));
        let result = copy.update("file:///nowhere", "main", None).await;
        assert!(matches!(result, Err(GitError::NotARepository(_))));
    }

    #[tokio::test]
    async fn test_failed_clone_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("repos").join("missing");
        let copy = WorkingCopy::new(&target, Duration::from_secs(30));

        let url = format!("file://{}", dir.path().join("no-such-repo").display());
        let result = copy.clone_shallow(&url, "main", None).await;

        assert!(result.is_err());
        assert!(!target.exists());
    }
}
