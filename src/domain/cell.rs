//! The cell: the unit of work the orchestrator schedules and the policy
//! engine reasons about. An epic cell decomposes into subtask cells via a
//! [`crate::domain::bead_tree::BeadTree`]; a subtask cell is what a worker
//! actually executes inside an isolated worktree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Where a cell originated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellSource {
    Human,
    System,
    SubtaskOf(String),
    Adapter(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellType {
    Epic,
    Subtask,
}

/// The cell lifecycle. Transitions are validated by [`Cell::can_transition_to`];
/// `force_status` bypasses validation for operator-driven corrections and is
/// always logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellStatus {
    Pending,
    Ready,
    Blocked,
    InProgress,
    InReview,
    Completed,
    Failed,
    Cancelled,
}

impl CellStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Blocked => "blocked",
            Self::InProgress => "in_progress",
            Self::InReview => "in_review",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "ready" => Some(Self::Ready),
            "blocked" => Some(Self::Blocked),
            "in_progress" => Some(Self::InProgress),
            "in_review" => Some(Self::InReview),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub const fn is_active(&self) -> bool {
        matches!(self, Self::InProgress | Self::InReview)
    }

    /// The set of statuses reachable in one transition from this one.
    pub fn valid_transitions(&self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Ready, Self::Blocked, Self::Cancelled],
            Self::Ready => &[Self::InProgress, Self::Blocked, Self::Cancelled],
            Self::Blocked => &[Self::Ready, Self::Cancelled],
            Self::InProgress => &[Self::InReview, Self::Failed, Self::Cancelled],
            Self::InReview => &[Self::Completed, Self::InProgress, Self::Failed, Self::Cancelled],
            Self::Completed | Self::Failed | Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, to: Self) -> bool {
        self.valid_transitions().contains(&to)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub id: String,
    pub cell_type: CellType,
    pub status: CellStatus,
    pub title: String,
    pub description: String,
    pub parent_id: Option<String>,
    pub dependencies: Vec<String>,
    pub source: CellSource,
    pub assigned_agent: Option<String>,
    pub estimated_complexity: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Cell {
    pub fn new(id: impl Into<String>, cell_type: CellType, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            cell_type,
            status: CellStatus::Pending,
            title: title.into(),
            description: String::new(),
            parent_id: None,
            dependencies: Vec::new(),
            source: CellSource::System,
            assigned_agent: None,
            estimated_complexity: None,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    #[must_use]
    pub fn with_dependency(mut self, dep_id: impl Into<String>) -> Self {
        self.dependencies.push(dep_id.into());
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: CellSource) -> Self {
        self.source = source;
        self
    }

    #[must_use]
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.assigned_agent = Some(agent.into());
        self
    }

    /// `I4`: a subtask cell must declare a parent; an epic cell must not.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self.cell_type {
            CellType::Subtask if self.parent_id.is_none() => {
                Err(CoreError::validation("subtask cell requires a parent_id"))
            }
            CellType::Epic if self.parent_id.is_some() => {
                Err(CoreError::validation("epic cell must not have a parent_id"))
            }
            _ => Ok(()),
        }
    }

    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn can_transition_to(&self, to: CellStatus) -> bool {
        self.status.can_transition_to(to)
    }

    /// `I2`/`I3`: validated transition; rejects moves the state machine forbids
    /// and any transition attempted from a terminal state.
    pub fn transition_to(&mut self, to: CellStatus) -> Result<(), CoreError> {
        if !self.can_transition_to(to) {
            return Err(CoreError::invalid_transition(self.status.as_str(), to.as_str()));
        }
        self.status = to;
        self.updated_at = Utc::now();
        self.version += 1;
        Ok(())
    }

    /// Bypasses the state machine. Reserved for operator-driven corrections;
    /// always logged at the call site.
    pub fn force_status(&mut self, to: CellStatus) {
        if !self.can_transition_to(to) {
            tracing::warn!(cell_id = %self.id, from = self.status.as_str(), to = to.as_str(), "forcing cell status outside state machine");
        }
        self.status = to;
        self.updated_at = Utc::now();
        self.version += 1;
    }
}
