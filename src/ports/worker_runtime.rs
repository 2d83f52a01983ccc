//! The boundary between the orchestrator and whatever actually executes a
//! subtask. The LLM-driven worker process itself is out of scope; this trait
//! is the seam a real one would be injected through.

use async_trait::async_trait;

use crate::domain::bead_tree::SubtaskSpec;
use crate::domain::job::ReviewVerdict;
use crate::error::CoreError;

#[derive(Debug, Clone)]
pub struct WorkerOutcome {
    pub subtask_id: String,
    pub success: bool,
    pub summary: String,
}

#[async_trait]
pub trait WorkerRuntime: Send + Sync {
    /// Runs a subtask to completion inside the given worktree path and
    /// returns its outcome. Cancellation is cooperative: callers drop the
    /// future or call [`WorkerRuntime::cancel`] with the same subtask id.
    async fn run(&self, subtask: &SubtaskSpec, worktree_path: &str) -> Result<WorkerOutcome, CoreError>;

    /// Best-effort cancellation of an in-flight subtask.
    async fn cancel(&self, subtask_id: &str) -> Result<(), CoreError>;
}

#[async_trait]
pub trait ReviewJudge: Send + Sync {
    /// Renders a verdict on a worker's completed output for a subtask.
    async fn review(&self, subtask: &SubtaskSpec, outcome: &WorkerOutcome) -> Result<ReviewVerdict, CoreError>;
}
