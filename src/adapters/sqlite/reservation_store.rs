use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::adapters::sqlite::parse_datetime;
use crate::domain::reservation::{Reservation, ReservationMode};
use crate::error::CoreError;
use crate::ports::ReservationStore;

pub struct SqliteReservationStore {
    pool: SqlitePool,
}

impl SqliteReservationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_reservation(row: &sqlx::sqlite::SqliteRow) -> Result<Reservation, CoreError> {
        let paths_json: String = row.try_get("paths").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        let mode_str: String = row.try_get("mode").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        let created_at: String = row.try_get("created_at").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        let expires_at: String = row.try_get("expires_at").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;

        Ok(Reservation {
            id: row.try_get::<i64, _>("id").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))? as u64,
            agent: row.try_get("agent").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?,
            paths: serde_json::from_str(&paths_json).map_err(|e| CoreError::validation(e.to_string()))?,
            mode: if mode_str == "exclusive" { ReservationMode::Exclusive } else { ReservationMode::Shared },
            reason: row.try_get("reason").unwrap_or_default(),
            created_at: parse_datetime(&created_at).map_err(CoreError::from)?,
            expires_at: parse_datetime(&expires_at).map_err(CoreError::from)?,
        })
    }
}

#[async_trait]
impl ReservationStore for SqliteReservationStore {
    async fn next_id(&self) -> Result<u64, CoreError> {
        let row: (i64,) = sqlx::query_as("UPDATE reservation_sequence SET next_value = next_value + 1 WHERE id = 1 RETURNING next_value - 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        Ok(row.0 as u64)
    }

    async fn insert(&self, reservation: Reservation) -> Result<(), CoreError> {
        let mode_str = match reservation.mode {
            ReservationMode::Exclusive => "exclusive",
            ReservationMode::Shared => "shared",
        };
        let paths_json = serde_json::to_string(&reservation.paths).map_err(|e| CoreError::validation(e.to_string()))?;

        sqlx::query(
            "INSERT INTO reservations (id, project_key, agent, paths, mode, reason, created_at, expires_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(reservation.id as i64)
        .bind("default")
        .bind(&reservation.agent)
        .bind(paths_json)
        .bind(mode_str)
        .bind(&reservation.reason)
        .bind(reservation.created_at.to_rfc3339())
        .bind(reservation.expires_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        Ok(())
    }

    async fn active(&self, project_key: &str, now: DateTime<Utc>) -> Result<Vec<Reservation>, CoreError> {
        let rows = sqlx::query("SELECT * FROM reservations WHERE project_key = ? AND expires_at > ?")
            .bind(project_key)
            .bind(now.to_rfc3339())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        rows.iter().map(Self::row_to_reservation).collect()
    }

    async fn release(&self, project_key: &str, reservation_id: u64) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM reservations WHERE project_key = ? AND id = ?")
            .bind(project_key)
            .bind(reservation_id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        Ok(())
    }

    async fn release_all_for_agent(&self, project_key: &str, agent: &str) -> Result<usize, CoreError> {
        let result = sqlx::query("DELETE FROM reservations WHERE project_key = ? AND agent = ?")
            .bind(project_key)
            .bind(agent)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        Ok(result.rows_affected() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use chrono::Duration;

    async fn store() -> SqliteReservationStore {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteReservationStore::new(pool)
    }

    async fn insert_reservation(store: &SqliteReservationStore, agent: &str, ttl: Duration) -> u64 {
        let id = store.next_id().await.unwrap();
        let reservation = Reservation::new(id, agent, vec!["src/a.rs".to_string()], ReservationMode::Exclusive, ttl);
        store.insert(reservation).await.unwrap();
        id
    }

    #[tokio::test]
    async fn active_excludes_expired_reservations() {
        let store = store().await;
        insert_reservation(&store, "agent-a", Duration::seconds(-1)).await;
        let active = store.active("default", Utc::now()).await.unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn release_removes_reservation() {
        let store = store().await;
        let id = insert_reservation(&store, "agent-a", Duration::hours(1)).await;
        store.release("default", id).await.unwrap();
        assert!(store.active("default", Utc::now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn release_all_for_agent_clears_every_matching_reservation() {
        let store = store().await;
        for _ in 0..3 {
            insert_reservation(&store, "agent-a", Duration::hours(1)).await;
        }
        let released = store.release_all_for_agent("default", "agent-a").await.unwrap();
        assert_eq!(released, 3);
    }
}
