//! Domain layer: the entities and state machines the coordination core operates on.
//!
//! These types are framework-agnostic — no sqlx, no tokio, no tracing — so the
//! services and adapters layers can be exercised against them without a database.

pub mod bead_tree;
pub mod cell;
pub mod job;
pub mod mandate;
pub mod message;
pub mod pattern;
pub mod reservation;
pub mod worktree;

pub use bead_tree::{BeadTree, EpicSpec, InstructionConflict, PlanCheckOutcome, PlanStats, PlanValidationError, SubtaskSpec};
pub use cell::{Cell, CellSource, CellStatus, CellType};
pub use job::{Job, JobStatus, OrchestratorEvent, ReviewVerdict};
pub use mandate::{ContentType, Mandate, MandateStatus, Vote, VoteType};
pub use message::{Agent, Message};
pub use pattern::{Maturity, MaturityState, ObservationKind, Pattern, PatternKind};
pub use reservation::{Reservation, ReservationMode};
pub use worktree::{Worktree, WorktreeStatus};
