//! Worktrees: one git worktree per subtask, the isolation layer between a
//! worker's edits and the project's main branch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorktreeStatus {
    Creating,
    Active,
    Completed,
    Merging,
    Merged,
    Failed,
    Removed,
}

impl WorktreeStatus {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Merged | Self::Removed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worktree {
    pub subtask_id: String,
    pub path: String,
    pub branch: String,
    pub base_ref: String,
    pub status: WorktreeStatus,
    pub merge_commit: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Worktree {
    pub fn new(subtask_id: impl Into<String>, base_ref: impl Into<String>) -> Self {
        let subtask_id = subtask_id.into();
        let now = Utc::now();
        Self {
            branch: Self::branch_name_for_subtask(&subtask_id),
            path: Self::path_for_subtask(&subtask_id),
            subtask_id,
            base_ref: base_ref.into(),
            status: WorktreeStatus::Creating,
            merge_commit: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn branch_name_for_subtask(subtask_id: &str) -> String {
        let short: String = subtask_id.chars().filter(|c| c.is_alphanumeric()).take(8).collect();
        format!("swarm/subtask-{short}")
    }

    pub fn path_for_subtask(subtask_id: &str) -> String {
        let short: String = subtask_id.chars().filter(|c| c.is_alphanumeric()).take(8).collect();
        format!(".swarm/worktrees/{short}")
    }

    pub fn activate(&mut self) {
        self.status = WorktreeStatus::Active;
        self.updated_at = Utc::now();
    }

    pub fn complete(&mut self) {
        self.status = WorktreeStatus::Completed;
        self.updated_at = Utc::now();
    }

    pub fn start_merge(&mut self) {
        self.status = WorktreeStatus::Merging;
        self.updated_at = Utc::now();
    }

    pub fn merged(&mut self, commit_sha: impl Into<String>) {
        self.status = WorktreeStatus::Merged;
        self.merge_commit = Some(commit_sha.into());
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = WorktreeStatus::Failed;
        self.error_message = Some(message.into());
        self.updated_at = Utc::now();
    }

    pub fn remove(&mut self) {
        self.status = WorktreeStatus::Removed;
        self.updated_at = Utc::now();
    }

    pub fn can_cleanup(&self) -> bool {
        matches!(self.status, WorktreeStatus::Merged | WorktreeStatus::Failed | WorktreeStatus::Completed)
    }
}
