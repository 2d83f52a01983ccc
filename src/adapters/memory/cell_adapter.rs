use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::cell::{Cell, CellStatus};
use crate::error::CoreError;
use crate::ports::CellAdapter;

#[derive(Default)]
pub struct InMemoryCellAdapter {
    cells: Mutex<HashMap<String, Cell>>,
}

impl InMemoryCellAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CellAdapter for InMemoryCellAdapter {
    async fn get(&self, id: &str) -> Result<Cell, CoreError> {
        self.cells.lock().unwrap().get(id).cloned().ok_or_else(|| CoreError::not_found(format!("cell {id}")))
    }

    async fn list_by_parent(&self, parent_id: &str) -> Result<Vec<Cell>, CoreError> {
        Ok(self
            .cells
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.parent_id.as_deref() == Some(parent_id))
            .cloned()
            .collect())
    }

    async fn create(&self, cell: Cell) -> Result<(), CoreError> {
        cell.validate()?;
        let mut cells = self.cells.lock().unwrap();
        if cells.contains_key(&cell.id) {
            return Err(CoreError::conflict(format!("cell {} already exists", cell.id)));
        }
        cells.insert(cell.id.clone(), cell);
        Ok(())
    }

    async fn update_status(&self, id: &str, status: CellStatus) -> Result<(), CoreError> {
        let mut cells = self.cells.lock().unwrap();
        let cell = cells.get_mut(id).ok_or_else(|| CoreError::not_found(format!("cell {id}")))?;
        cell.transition_to(status)
    }

    async fn assign_agent(&self, id: &str, agent: &str) -> Result<(), CoreError> {
        let mut cells = self.cells.lock().unwrap();
        let cell = cells.get_mut(id).ok_or_else(|| CoreError::not_found(format!("cell {id}")))?;
        cell.assigned_agent = Some(agent.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cell::CellType;

    #[tokio::test]
    async fn create_and_get_round_trips() {
        let adapter = InMemoryCellAdapter::new();
        let cell = Cell::new("epic-1", CellType::Epic, "Epic");
        adapter.create(cell.clone()).await.unwrap();
        let fetched = adapter.get("epic-1").await.unwrap();
        assert_eq!(fetched.id, cell.id);
    }

    #[tokio::test]
    async fn duplicate_create_is_a_conflict() {
        let adapter = InMemoryCellAdapter::new();
        let cell = Cell::new("epic-1", CellType::Epic, "Epic");
        adapter.create(cell.clone()).await.unwrap();
        let err = adapter.create(cell).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_status_validates_transition() {
        let adapter = InMemoryCellAdapter::new();
        adapter.create(Cell::new("epic-1", CellType::Epic, "Epic")).await.unwrap();
        let err = adapter.update_status("epic-1", CellStatus::Completed).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn list_by_parent_filters_correctly() {
        let adapter = InMemoryCellAdapter::new();
        adapter.create(Cell::new("epic-1", CellType::Epic, "Epic")).await.unwrap();
        adapter.create(Cell::new("epic-1.1", CellType::Subtask, "s1").with_parent("epic-1")).await.unwrap();
        adapter.create(Cell::new("epic-1.2", CellType::Subtask, "s2").with_parent("epic-1")).await.unwrap();
        let children = adapter.list_by_parent("epic-1").await.unwrap();
        assert_eq!(children.len(), 2);
    }

    #[tokio::test]
    async fn get_missing_cell_is_not_found() {
        let adapter = InMemoryCellAdapter::new();
        assert!(matches!(adapter.get("ghost").await, Err(CoreError::NotFound(_))));
    }
}
