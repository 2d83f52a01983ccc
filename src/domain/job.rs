//! Jobs: one orchestration run over a bead tree, and the observable event
//! stream it emits as subtasks move through the review gate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// The review gate's verdict on a subtask's completed work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewVerdict {
    Approved,
    NeedsChanges,
    Hallucinating,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub epic_id: String,
    pub status: JobStatus,
    pub total_subtasks: usize,
    pub completed_subtasks: usize,
    pub failed_subtasks: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(epic_id: impl Into<String>, total_subtasks: usize) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            epic_id: epic_id.into(),
            status: JobStatus::Pending,
            total_subtasks,
            completed_subtasks: 0,
            failed_subtasks: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn start(&mut self) {
        self.status = JobStatus::Running;
        self.updated_at = Utc::now();
    }

    pub fn record_subtask_completed(&mut self) {
        self.completed_subtasks += 1;
        self.updated_at = Utc::now();
        self.reconcile_terminal_status();
    }

    pub fn record_subtask_failed(&mut self) {
        self.failed_subtasks += 1;
        self.updated_at = Utc::now();
        self.reconcile_terminal_status();
    }

    pub fn cancel(&mut self) {
        self.status = JobStatus::Cancelled;
        self.updated_at = Utc::now();
    }

    fn reconcile_terminal_status(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        let accounted_for = self.completed_subtasks + self.failed_subtasks;
        if accounted_for < self.total_subtasks {
            return;
        }
        self.status = if self.failed_subtasks > 0 { JobStatus::Failed } else { JobStatus::Completed };
    }
}

/// Lifecycle events a caller can subscribe to instead of polling job status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrchestratorEvent {
    JobStarted { job_id: Uuid, epic_id: String, total_subtasks: usize },
    SubtaskStarted { job_id: Uuid, subtask_id: String },
    ReviewVerdictRendered { job_id: Uuid, subtask_id: String, verdict: ReviewVerdict, attempt: u32 },
    SubtaskClosed { job_id: Uuid, subtask_id: String },
    SubtaskFailed { job_id: Uuid, subtask_id: String, reason: String },
    JobCompleted { job_id: Uuid },
    JobFailed { job_id: Uuid, reason: String },
    JobCancelled { job_id: Uuid },
}
