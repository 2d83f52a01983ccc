//! The narrow interface the orchestrator uses to read and mutate cells.
//!
//! Deliberately thin: this is not an issue-tracker integration, just a store
//! for the orchestrator's own bookkeeping. A real issue-tracker adapter is
//! out of scope and would sit behind this same trait.

use async_trait::async_trait;

use crate::domain::cell::{Cell, CellStatus};
use crate::error::CoreError;

#[async_trait]
pub trait CellAdapter: Send + Sync {
    async fn get(&self, id: &str) -> Result<Cell, CoreError>;
    async fn list_by_parent(&self, parent_id: &str) -> Result<Vec<Cell>, CoreError>;
    async fn create(&self, cell: Cell) -> Result<(), CoreError>;
    async fn update_status(&self, id: &str, status: CellStatus) -> Result<(), CoreError>;
    async fn assign_agent(&self, id: &str, agent: &str) -> Result<(), CoreError>;
}
