//! Git worktree-per-subtask isolation. Each subtask gets its own worktree
//! and branch so parallel agents never collide in the working directory;
//! merging a completed subtask back cherry-picks its commits onto the base
//! ref rather than merging the branch wholesale, so conflicts surface per
//! commit instead of as one large merge.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{error, info, instrument, warn};

use crate::domain::worktree::{Worktree, WorktreeStatus};
use crate::error::CoreError;

pub struct WorktreeManager;

impl Default for WorktreeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl WorktreeManager {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self))]
    pub async fn create(&self, subtask_id: &str, base_ref: &str) -> Result<Worktree, CoreError> {
        let mut worktree = Worktree::new(subtask_id, base_ref);

        if let Some(parent) = Path::new(&worktree.path).parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        }

        let output = Command::new("git")
            .args(["worktree", "add", "-b", &worktree.branch, &worktree.path, base_ref])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            error!(subtask_id, %stderr, "git worktree add failed");
            worktree.fail(stderr.clone());
            return Err(CoreError::subsystem_unavailable(stderr));
        }

        worktree.activate();
        info!(subtask_id, branch = %worktree.branch, path = %worktree.path, "worktree created");
        Ok(worktree)
    }

    /// Cherry-picks every commit unique to the worktree's branch (relative
    /// to `base_ref`) onto `base_ref`, one at a time, so a conflicting commit
    /// can be surfaced and aborted without losing the commits before it.
    #[instrument(skip(self))]
    pub async fn merge(&self, worktree: &mut Worktree, base_ref: &str) -> Result<(), CoreError> {
        worktree.start_merge();

        let commits = self.commits_since(&worktree.branch, base_ref).await?;
        if commits.is_empty() {
            worktree.merged("".to_string());
            return Ok(());
        }

        for commit in &commits {
            let output = Command::new("git")
                .args(["cherry-pick", commit])
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .await
                .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;

            if !output.status.success() {
                let conflict_paths = self.conflicted_paths().await.unwrap_or_default();
                let _ = Command::new("git").args(["cherry-pick", "--abort"]).stdout(Stdio::null()).stderr(Stdio::null()).status().await;
                let detail = format!("cherry-pick of {commit} conflicted: {}", conflict_paths.join(", "));
                warn!(subtask_id = %worktree.subtask_id, %detail, "merge aborted");
                worktree.fail(detail.clone());
                return Err(CoreError::conflict(detail));
            }
        }

        let head = self.current_head().await?;
        worktree.merged(head);
        info!(subtask_id = %worktree.subtask_id, "worktree merged");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, worktree: &mut Worktree) -> Result<(), CoreError> {
        if !worktree.can_cleanup() {
            return Err(CoreError::validation("worktree is not in a removable state"));
        }

        let output = Command::new("git")
            .args(["worktree", "remove", "--force", &worktree.path])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;

        if !output.status.success() {
            warn!(path = %worktree.path, stderr = %String::from_utf8_lossy(&output.stderr), "worktree remove failed");
        }

        worktree.remove();
        Ok(())
    }

    async fn commits_since(&self, branch: &str, base_ref: &str) -> Result<Vec<String>, CoreError> {
        let output = Command::new("git")
            .args(["rev-list", "--reverse", &format!("{base_ref}..{branch}")])
            .output()
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        if !output.status.success() {
            return Err(CoreError::subsystem_unavailable(String::from_utf8_lossy(&output.stderr).to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).lines().map(str::to_string).filter(|l| !l.is_empty()).collect())
    }

    async fn conflicted_paths(&self) -> Result<Vec<String>, CoreError> {
        let output = Command::new("git")
            .args(["status", "--porcelain"])
            .output()
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|l| l.starts_with("UU") || l.starts_with("AA"))
            .map(|l| l[3..].to_string())
            .collect())
    }

    async fn current_head(&self) -> Result<String, CoreError> {
        let output = Command::new("git")
            .args(["rev-parse", "HEAD"])
            .output()
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
