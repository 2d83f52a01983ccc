use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::adapters::sqlite::{parse_datetime, parse_json_or_default};
use crate::domain::cell::{Cell, CellSource, CellStatus, CellType};
use crate::error::CoreError;
use crate::ports::CellAdapter;

pub struct SqliteCellAdapter {
    pool: SqlitePool,
}

impl SqliteCellAdapter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_cell(row: &sqlx::sqlite::SqliteRow) -> Result<Cell, CoreError> {
        let cell_type_str: String = row.try_get("cell_type").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        let status_str: String = row.try_get("status").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        let source_str: String = row.try_get("source").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        let dependencies_json: Option<String> = row.try_get("dependencies").ok();
        let created_at: String = row.try_get("created_at").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        let updated_at: String = row.try_get("updated_at").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;

        Ok(Cell {
            id: row.try_get("id").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?,
            cell_type: if cell_type_str == "epic" { CellType::Epic } else { CellType::Subtask },
            status: CellStatus::from_str_opt(&status_str).ok_or_else(|| CoreError::validation(format!("unknown status {status_str}")))?,
            title: row.try_get("title").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?,
            description: row.try_get("description").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?,
            parent_id: row.try_get("parent_id").ok().flatten(),
            dependencies: parse_json_or_default(dependencies_json).map_err(CoreError::from)?,
            source: parse_source(&source_str),
            assigned_agent: row.try_get("assigned_agent").ok().flatten(),
            estimated_complexity: row.try_get::<Option<i64>, _>("estimated_complexity").ok().flatten().map(|v| v as u8),
            created_at: parse_datetime(&created_at).map_err(CoreError::from)?,
            updated_at: parse_datetime(&updated_at).map_err(CoreError::from)?,
            version: row.try_get::<i64, _>("version").unwrap_or(0) as u64,
        })
    }
}

fn parse_source(s: &str) -> CellSource {
    if let Some(rest) = s.strip_prefix("subtask_of:") {
        return CellSource::SubtaskOf(rest.to_string());
    }
    if let Some(rest) = s.strip_prefix("adapter:") {
        return CellSource::Adapter(rest.to_string());
    }
    match s {
        "human" => CellSource::Human,
        _ => CellSource::System,
    }
}

fn render_source(source: &CellSource) -> String {
    match source {
        CellSource::Human => "human".to_string(),
        CellSource::System => "system".to_string(),
        CellSource::SubtaskOf(id) => format!("subtask_of:{id}"),
        CellSource::Adapter(name) => format!("adapter:{name}"),
    }
}

#[async_trait]
impl CellAdapter for SqliteCellAdapter {
    async fn get(&self, id: &str) -> Result<Cell, CoreError> {
        let row = sqlx::query("SELECT * FROM cells WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?
            .ok_or_else(|| CoreError::not_found(format!("cell {id}")))?;
        Self::row_to_cell(&row)
    }

    async fn list_by_parent(&self, parent_id: &str) -> Result<Vec<Cell>, CoreError> {
        let rows = sqlx::query("SELECT * FROM cells WHERE parent_id = ? ORDER BY created_at")
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        rows.iter().map(Self::row_to_cell).collect()
    }

    async fn create(&self, cell: Cell) -> Result<(), CoreError> {
        cell.validate()?;
        let existing = sqlx::query("SELECT 1 FROM cells WHERE id = ?")
            .bind(&cell.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        if existing.is_some() {
            return Err(CoreError::conflict(format!("cell {} already exists", cell.id)));
        }

        let cell_type_str = match cell.cell_type {
            CellType::Epic => "epic",
            CellType::Subtask => "subtask",
        };
        let dependencies_json = serde_json::to_string(&cell.dependencies).map_err(|e| CoreError::validation(e.to_string()))?;

        sqlx::query(
            "INSERT INTO cells (id, cell_type, status, title, description, parent_id, dependencies, source, assigned_agent, estimated_complexity, created_at, updated_at, version)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&cell.id)
        .bind(cell_type_str)
        .bind(cell.status.as_str())
        .bind(&cell.title)
        .bind(&cell.description)
        .bind(&cell.parent_id)
        .bind(dependencies_json)
        .bind(render_source(&cell.source))
        .bind(&cell.assigned_agent)
        .bind(cell.estimated_complexity.map(i64::from))
        .bind(cell.created_at.to_rfc3339())
        .bind(cell.updated_at.to_rfc3339())
        .bind(cell.version as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;

        Ok(())
    }

    async fn update_status(&self, id: &str, status: CellStatus) -> Result<(), CoreError> {
        let mut cell = self.get(id).await?;
        cell.transition_to(status)?;

        sqlx::query("UPDATE cells SET status = ?, updated_at = ?, version = ? WHERE id = ?")
            .bind(cell.status.as_str())
            .bind(cell.updated_at.to_rfc3339())
            .bind(cell.version as i64)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;

        Ok(())
    }

    async fn assign_agent(&self, id: &str, agent: &str) -> Result<(), CoreError> {
        let result = sqlx::query("UPDATE cells SET assigned_agent = ? WHERE id = ?")
            .bind(agent)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(format!("cell {id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    async fn adapter() -> SqliteCellAdapter {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteCellAdapter::new(pool)
    }

    #[tokio::test]
    async fn create_and_get_round_trips() {
        let adapter = adapter().await;
        let cell = Cell::new("epic-1", CellType::Epic, "Epic");
        adapter.create(cell.clone()).await.unwrap();
        let fetched = adapter.get("epic-1").await.unwrap();
        assert_eq!(fetched.id, cell.id);
        assert_eq!(fetched.status, CellStatus::Pending);
    }

    #[tokio::test]
    async fn duplicate_create_is_a_conflict() {
        let adapter = adapter().await;
        let cell = Cell::new("epic-1", CellType::Epic, "Epic");
        adapter.create(cell.clone()).await.unwrap();
        let err = adapter.create(cell).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_status_persists_and_validates() {
        let adapter = adapter().await;
        adapter.create(Cell::new("epic-1", CellType::Epic, "Epic")).await.unwrap();
        adapter.update_status("epic-1", CellStatus::Ready).await.unwrap();
        let fetched = adapter.get("epic-1").await.unwrap();
        assert_eq!(fetched.status, CellStatus::Ready);

        let err = adapter.update_status("epic-1", CellStatus::Completed).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn list_by_parent_filters_correctly() {
        let adapter = adapter().await;
        adapter.create(Cell::new("epic-1", CellType::Epic, "Epic")).await.unwrap();
        adapter.create(Cell::new("epic-1.1", CellType::Subtask, "s1").with_parent("epic-1")).await.unwrap();
        adapter.create(Cell::new("epic-1.2", CellType::Subtask, "s2").with_parent("epic-1")).await.unwrap();
        let children = adapter.list_by_parent("epic-1").await.unwrap();
        assert_eq!(children.len(), 2);
    }
}
