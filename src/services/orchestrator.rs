//! The orchestrator: walks a validated [`BeadTree`] wave by wave, spawning a
//! worker per ready subtask, running each through the review gate, and
//! driving the job to a terminal status. Progress is observable through an
//! [`OrchestratorEvent`] stream rather than by polling.

use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use crate::config::OrchestratorConfig;
use crate::domain::bead_tree::{BeadTree, SubtaskSpec};
use crate::domain::cell::{Cell, CellSource, CellStatus, CellType};
use crate::domain::job::{Job, JobStatus, OrchestratorEvent, ReviewVerdict};
use crate::domain::reservation::ReservationMode;
use crate::error::CoreError;
use crate::ports::{CellAdapter, ReviewJudge, WorkerRuntime};
use crate::services::reservation_registry::ReservationRegistry;
use crate::services::worktree_manager::WorktreeManager;

/// Run-time knobs that vary per job rather than living in static config:
/// whether to isolate subtasks in worktrees, and when to give up.
#[derive(Debug)]
pub struct RunOptions {
    pub use_worktrees: bool,
    pub stop_on_failure: bool,
    pub max_iterations: u32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { use_worktrees: true, stop_on_failure: false, max_iterations: 1000 }
    }
}

pub struct Orchestrator {
    cells: Arc<dyn CellAdapter>,
    reservations: ReservationRegistry,
    worktrees: WorktreeManager,
    worker: Arc<dyn WorkerRuntime>,
    judge: Arc<dyn ReviewJudge>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        cells: Arc<dyn CellAdapter>,
        reservations: ReservationRegistry,
        worker: Arc<dyn WorkerRuntime>,
        judge: Arc<dyn ReviewJudge>,
        config: OrchestratorConfig,
    ) -> Self {
        Self { cells, reservations, worktrees: WorktreeManager::new(), worker, judge, config }
    }

    /// Materializes an epic cell and one subtask cell per `tree.subtasks`,
    /// then drives the job to completion, emitting one [`OrchestratorEvent`]
    /// per lifecycle transition on `events`.
    #[instrument(skip(self, tree, events))]
    pub async fn run_job(&self, tree: &BeadTree, base_ref: &str, options: RunOptions, events: mpsc::Sender<OrchestratorEvent>) -> Result<Job, CoreError> {
        if !tree.is_valid() {
            return Err(CoreError::validation("bead tree failed plan validation"));
        }

        self.materialize_cells(tree).await?;

        let mut job = Job::new(tree.epic.id.clone(), tree.subtasks.len());
        job.start();
        let _ = events.send(OrchestratorEvent::JobStarted { job_id: job.id, epic_id: job.epic_id.clone(), total_subtasks: job.total_subtasks }).await;

        let mut iterations = 0u32;
        let mut aborted_reason: Option<String> = None;

        'waves: for wave in tree.execution_waves() {
            for subtask_id in &wave {
                iterations += 1;
                if iterations > options.max_iterations {
                    aborted_reason = Some("max_iterations reached".to_string());
                    break 'waves;
                }

                let subtask = tree.subtasks.iter().find(|s| &s.id == subtask_id).expect("execution wave references a known subtask");
                let outcome = self.run_subtask(&job, subtask, base_ref, options.use_worktrees, &events).await;

                match outcome {
                    Ok(true) => job.record_subtask_completed(),
                    Ok(false) | Err(_) => {
                        job.record_subtask_failed();
                        if options.stop_on_failure {
                            aborted_reason = Some(format!("subtask {subtask_id} failed"));
                            break 'waves;
                        }
                    }
                }
            }
        }

        if let Some(reason) = aborted_reason {
            job.cancel();
            self.worker_abort_best_effort(tree).await;
            let _ = events.send(OrchestratorEvent::JobCancelled { job_id: job.id }).await;
            warn!(job_id = %job.id, %reason, "job aborted");
            return Ok(job);
        }

        match job.status {
            JobStatus::Completed => {
                let _ = events.send(OrchestratorEvent::JobCompleted { job_id: job.id }).await;
            }
            JobStatus::Failed => {
                let _ = events.send(OrchestratorEvent::JobFailed { job_id: job.id, reason: "one or more subtasks failed".to_string() }).await;
            }
            _ => {}
        }

        info!(job_id = %job.id, status = ?job.status, "job finished");
        Ok(job)
    }

    async fn materialize_cells(&self, tree: &BeadTree) -> Result<(), CoreError> {
        let epic_cell = Cell::new(tree.epic.id.clone(), CellType::Epic, tree.epic.title.clone())
            .with_description(tree.epic.description.clone())
            .with_source(CellSource::System);
        epic_cell.validate()?;
        self.cells.create(epic_cell).await?;

        for subtask in &tree.subtasks {
            let mut cell = Cell::new(subtask.id.clone(), CellType::Subtask, subtask.title.clone())
                .with_description(subtask.instructions.clone())
                .with_parent(tree.epic.id.clone())
                .with_source(CellSource::SubtaskOf(tree.epic.id.clone()));
            for &dep_idx in &subtask.depends_on {
                cell = cell.with_dependency(tree.subtasks[dep_idx].id.clone());
            }
            cell.estimated_complexity = Some(subtask.estimated_complexity);
            cell.validate()?;
            self.cells.create(cell).await?;
        }
        Ok(())
    }

    /// Runs one subtask through reservation, optional worktree isolation,
    /// and the bounded review-gate loop. Returns `Ok(true)` on approval,
    /// `Ok(false)` once review attempts are exhausted.
    async fn run_subtask(&self, job: &Job, subtask: &SubtaskSpec, base_ref: &str, use_worktrees: bool, events: &mpsc::Sender<OrchestratorEvent>) -> Result<bool, CoreError> {
        self.cells.update_status(&subtask.id, CellStatus::Ready).await?;

        let agent = format!("worker-{}", subtask.id);
        let (_reservation, _conflicts) = self
            .reservations
            .reserve("default", &agent, subtask.exclusive_paths.clone(), ReservationMode::Exclusive, &format!("subtask {}", subtask.id))
            .await?;

        let mut worktree = if use_worktrees { Some(self.worktrees.create(&subtask.id, base_ref).await?) } else { None };
        let worktree_path = worktree.as_ref().map(|w| w.path.clone()).unwrap_or_else(|| ".".to_string());

        self.cells.update_status(&subtask.id, CellStatus::InProgress).await?;
        self.cells.assign_agent(&subtask.id, &agent).await?;
        let _ = events.send(OrchestratorEvent::SubtaskStarted { job_id: job.id, subtask_id: subtask.id.clone() }).await;

        let mut attempts_remaining = self.config.max_review_attempts;
        let mut attempt = 0u32;
        let result = loop {
            attempt += 1;
            let run_result = self.worker.run(subtask, &worktree_path).await;

            let outcome = match run_result {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(subtask_id = %subtask.id, error = %e, "worker invocation failed");
                    break Err(e);
                }
            };

            self.cells.update_status(&subtask.id, CellStatus::InReview).await?;
            let verdict = self.judge.review(subtask, &outcome).await?;
            let _ = events.send(OrchestratorEvent::ReviewVerdictRendered { job_id: job.id, subtask_id: subtask.id.clone(), verdict, attempt }).await;

            match verdict {
                ReviewVerdict::Approved | ReviewVerdict::Hallucinating => break Ok(()),
                ReviewVerdict::NeedsChanges => {
                    attempts_remaining -= 1;
                    if attempts_remaining == 0 {
                        break Err(CoreError::subsystem_unavailable("review attempts exhausted"));
                    }
                    self.cells.update_status(&subtask.id, CellStatus::InProgress).await?;
                }
            }
        };

        self.reservations.release_all_for_agent("default", &agent).await?;

        match result {
            Ok(()) => {
                if let Some(worktree) = worktree.as_mut() {
                    if let Err(e) = self.worktrees.merge(worktree, base_ref).await {
                        self.cells.update_status(&subtask.id, CellStatus::Failed).await?;
                        let _ = events.send(OrchestratorEvent::SubtaskFailed { job_id: job.id, subtask_id: subtask.id.clone(), reason: e.to_string() }).await;
                        return Ok(false);
                    }
                    let _ = self.worktrees.remove(worktree).await;
                }
                self.cells.update_status(&subtask.id, CellStatus::Completed).await?;
                let _ = events.send(OrchestratorEvent::SubtaskClosed { job_id: job.id, subtask_id: subtask.id.clone() }).await;
                Ok(true)
            }
            Err(e) => {
                self.cells.update_status(&subtask.id, CellStatus::Failed).await?;
                if let Some(worktree) = worktree.as_mut() {
                    let _ = self.worktrees.remove(worktree).await;
                }
                let _ = events.send(OrchestratorEvent::SubtaskFailed { job_id: job.id, subtask_id: subtask.id.clone(), reason: e.to_string() }).await;
                Ok(false)
            }
        }
    }

    async fn worker_abort_best_effort(&self, tree: &BeadTree) {
        for subtask in &tree.subtasks {
            let _ = self.worker.cancel(&subtask.id).await;
        }
    }
}

/// Grace window between SIGTERM and SIGKILL when cancelling a running worker.
const CANCEL_GRACE: std::time::Duration = std::time::Duration::from_secs(5);

/// Default [`WorkerRuntime`]: runs a configured shell command per subtask.
/// Not an LLM-driven worker; a concrete, inspectable stand-in used for
/// integration testing and as the crate's shipped default. Tracks each
/// running child's pid so [`WorkerRuntime::cancel`] can send it a signal.
pub struct CommandWorkerRuntime {
    program: String,
    args: Vec<String>,
    running: std::sync::Mutex<std::collections::HashMap<String, u32>>,
}

impl CommandWorkerRuntime {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args, running: std::sync::Mutex::new(std::collections::HashMap::new()) }
    }
}

#[async_trait::async_trait]
impl WorkerRuntime for CommandWorkerRuntime {
    async fn run(&self, subtask: &SubtaskSpec, worktree_path: &str) -> Result<crate::ports::WorkerOutcome, CoreError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(&subtask.instructions)
            .current_dir(worktree_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;

        if let Some(pid) = child.id() {
            self.running.lock().unwrap().insert(subtask.id.clone(), pid);
        }

        let output = child.wait_with_output().await.map_err(|e| CoreError::subsystem_unavailable(e.to_string()));
        self.running.lock().unwrap().remove(&subtask.id);
        let output = output?;

        Ok(crate::ports::WorkerOutcome {
            subtask_id: subtask.id.clone(),
            success: output.status.success(),
            summary: String::from_utf8_lossy(&output.stdout).to_string(),
        })
    }

    /// Sends SIGTERM, waits [`CANCEL_GRACE`], then SIGKILL if the process is
    /// still tracked as running — the teacher's timeout-then-escalate
    /// pattern for killing subprocesses, adapted from a single signal call
    /// to the two-stage grace window spec.md's cancellation model requires.
    async fn cancel(&self, subtask_id: &str) -> Result<(), CoreError> {
        let Some(pid) = self.running.lock().unwrap().get(subtask_id).copied() else {
            return Ok(());
        };
        let nix_pid = nix::unistd::Pid::from_raw(pid as i32);
        let _ = nix::sys::signal::kill(nix_pid, nix::sys::signal::Signal::SIGTERM);

        tokio::time::sleep(CANCEL_GRACE).await;

        if self.running.lock().unwrap().contains_key(subtask_id) {
            warn!(subtask_id, pid, "worker did not exit after SIGTERM grace window, sending SIGKILL");
            let _ = nix::sys::signal::kill(nix_pid, nix::sys::signal::Signal::SIGKILL);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryCellAdapter;
    use crate::adapters::memory::InMemoryReservationStore;
    use crate::config::ReservationConfig;
    use crate::domain::bead_tree::EpicSpec;
    use crate::ports::WorkerOutcome;

    struct AlwaysApprove;

    #[async_trait::async_trait]
    impl ReviewJudge for AlwaysApprove {
        async fn review(&self, _subtask: &SubtaskSpec, _outcome: &WorkerOutcome) -> Result<ReviewVerdict, CoreError> {
            Ok(ReviewVerdict::Approved)
        }
    }

    struct AlwaysNeedsChanges;

    #[async_trait::async_trait]
    impl ReviewJudge for AlwaysNeedsChanges {
        async fn review(&self, _subtask: &SubtaskSpec, _outcome: &WorkerOutcome) -> Result<ReviewVerdict, CoreError> {
            Ok(ReviewVerdict::NeedsChanges)
        }
    }

    struct StubWorker;

    #[async_trait::async_trait]
    impl WorkerRuntime for StubWorker {
        async fn run(&self, subtask: &SubtaskSpec, _worktree_path: &str) -> Result<WorkerOutcome, CoreError> {
            Ok(WorkerOutcome { subtask_id: subtask.id.clone(), success: true, summary: "done".to_string() })
        }

        async fn cancel(&self, _subtask_id: &str) -> Result<(), CoreError> {
            Ok(())
        }
    }

    fn orchestrator(judge: Arc<dyn ReviewJudge>) -> Orchestrator {
        Orchestrator::new(
            Arc::new(InMemoryCellAdapter::new()),
            ReservationRegistry::new(Arc::new(InMemoryReservationStore::new()), ReservationConfig::default()),
            Arc::new(StubWorker),
            judge,
            OrchestratorConfig { max_review_attempts: 2 },
        )
    }

    fn tree() -> BeadTree {
        BeadTree {
            epic: EpicSpec { id: "epic-1".to_string(), title: "Epic".to_string(), description: String::new() },
            subtasks: vec![SubtaskSpec {
                id: "epic-1.1".to_string(),
                epic_id: "epic-1".to_string(),
                title: "Subtask".to_string(),
                instructions: "do the thing".to_string(),
                depends_on: Vec::new(),
                exclusive_paths: vec!["src/a.rs".to_string()],
                shared_paths: Vec::new(),
                estimated_complexity: 1,
            }],
        }
    }

    #[tokio::test]
    async fn job_completes_when_review_approves_without_worktrees() {
        let orchestrator = orchestrator(Arc::new(AlwaysApprove));
        let (tx, _rx) = mpsc::channel(16);
        let options = RunOptions { use_worktrees: false, ..Default::default() };
        let job = orchestrator.run_job(&tree(), "main", options, tx).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.completed_subtasks, 1);
    }

    #[tokio::test]
    async fn job_fails_when_review_attempts_exhausted() {
        let orchestrator = orchestrator(Arc::new(AlwaysNeedsChanges));
        let (tx, _rx) = mpsc::channel(16);
        let options = RunOptions { use_worktrees: false, ..Default::default() };
        let job = orchestrator.run_job(&tree(), "main", options, tx).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failed_subtasks, 1);
    }

    #[tokio::test]
    async fn invalid_plan_is_rejected_before_any_cell_is_created() {
        let orchestrator = orchestrator(Arc::new(AlwaysApprove));
        let mut bad_tree = tree();
        bad_tree.subtasks[0].depends_on.push(99);
        let (tx, _rx) = mpsc::channel(16);
        let err = orchestrator.run_job(&bad_tree, "main", RunOptions::default(), tx).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }

    #[tokio::test]
    async fn stop_on_failure_cancels_remaining_waves() {
        let orchestrator = orchestrator(Arc::new(AlwaysNeedsChanges));
        let mut tree = tree();
        tree.subtasks.push(SubtaskSpec {
            id: "epic-1.2".to_string(),
            epic_id: "epic-1".to_string(),
            title: "Second".to_string(),
            instructions: "do another thing".to_string(),
            depends_on: vec![0],
            exclusive_paths: vec!["src/b.rs".to_string()],
            shared_paths: Vec::new(),
            estimated_complexity: 1,
        });
        let (tx, _rx) = mpsc::channel(16);
        let options = RunOptions { use_worktrees: false, stop_on_failure: true, max_iterations: 1000 };
        let job = orchestrator.run_job(&tree, "main", options, tx).await.unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
    }
}
