//! Invoked by the host when session memory is about to be summarized. When a
//! swarm is active, appends a fixed instruction block telling whatever
//! context survives compaction how to pick the coordination loop back up.

use std::sync::Arc;

use tracing::instrument;

use crate::domain::cell::{Cell, CellStatus};
use crate::error::CoreError;
use crate::ports::CellAdapter;

const RESUMPTION_INSTRUCTIONS: &str = "A multi-agent swarm is active. To resume: \
query epic status via the cell adapter, read your inbox for messages sent while \
compacting, spawn any subtask whose dependencies are closed, investigate and \
unblock any subtask in the blocked state, and continue closing the loop until \
the epic is closed.";

pub struct CompactionHook {
    cells: Arc<dyn CellAdapter>,
}

impl CompactionHook {
    pub fn new(cells: Arc<dyn CellAdapter>) -> Self {
        Self { cells }
    }

    /// Returns `Some(instructions)` if a swarm is active under the given
    /// epic, `None` if the hook should be a no-op. A swarm is active if any
    /// subtask is in progress, or any cell has a parent and is not yet
    /// terminal.
    #[instrument(skip(self))]
    pub async fn on_compaction(&self, epic_id: &str) -> Result<Option<&'static str>, CoreError> {
        let cells = self.cells.list_by_parent(epic_id).await?;
        if self.swarm_is_active(&cells) {
            Ok(Some(RESUMPTION_INSTRUCTIONS))
        } else {
            Ok(None)
        }
    }

    fn swarm_is_active(&self, cells: &[Cell]) -> bool {
        cells.iter().any(|c| c.status == CellStatus::InProgress || (c.parent_id.is_some() && !c.status.is_terminal()))
    }
}
