use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::error::CoreError;
use crate::ports::RateLimitBackend;

pub struct SqliteRateLimitBackend {
    pool: SqlitePool,
}

impl SqliteRateLimitBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateLimitBackend for SqliteRateLimitBackend {
    async fn record_and_count(&self, agent: &str, endpoint: &str, window_ms: i64, now_ms: i64) -> Result<u32, CoreError> {
        let cutoff = now_ms - window_ms;

        sqlx::query("DELETE FROM rate_limit_records WHERE agent = ? AND endpoint = ? AND ts_ms <= ?")
            .bind(agent)
            .bind(endpoint)
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;

        sqlx::query("INSERT INTO rate_limit_records (agent, endpoint, ts_ms) VALUES (?, ?, ?)")
            .bind(agent)
            .bind(endpoint)
            .bind(now_ms)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;

        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rate_limit_records WHERE agent = ? AND endpoint = ? AND ts_ms > ?")
            .bind(agent)
            .bind(endpoint)
            .bind(cutoff)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;

        Ok(row.0 as u32)
    }

    async fn oldest_in_window(&self, agent: &str, endpoint: &str, window_ms: i64, now_ms: i64) -> Result<Option<i64>, CoreError> {
        let cutoff = now_ms - window_ms;
        let row = sqlx::query("SELECT ts_ms FROM rate_limit_records WHERE agent = ? AND endpoint = ? AND ts_ms > ? ORDER BY ts_ms LIMIT 1")
            .bind(agent)
            .bind(endpoint)
            .bind(cutoff)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        row.map(|r| r.try_get::<i64, _>("ts_ms").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    async fn backend() -> SqliteRateLimitBackend {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteRateLimitBackend::new(pool)
    }

    #[tokio::test]
    async fn counts_requests_within_window() {
        let backend = backend().await;
        assert_eq!(backend.record_and_count("a", "chat", 1000, 0).await.unwrap(), 1);
        assert_eq!(backend.record_and_count("a", "chat", 1000, 100).await.unwrap(), 2);
        assert_eq!(backend.record_and_count("a", "chat", 1000, 200).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn requests_outside_window_are_dropped() {
        let backend = backend().await;
        backend.record_and_count("a", "chat", 1000, 0).await.unwrap();
        backend.record_and_count("a", "chat", 1000, 500).await.unwrap();
        let count = backend.record_and_count("a", "chat", 1000, 1600).await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn oldest_in_window_reports_earliest_surviving_timestamp() {
        let backend = backend().await;
        backend.record_and_count("a", "chat", 1000, 0).await.unwrap();
        backend.record_and_count("a", "chat", 1000, 300).await.unwrap();
        let oldest = backend.oldest_in_window("a", "chat", 1000, 300).await.unwrap();
        assert_eq!(oldest, Some(0));
    }
}
