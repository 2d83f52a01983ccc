use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::adapters::sqlite::parse_optional_datetime;
use crate::domain::message::{Agent, Message};
use crate::error::CoreError;
use crate::ports::MessageStore;

pub struct SqliteMessageStore {
    pool: SqlitePool,
}

impl SqliteMessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message, CoreError> {
        let id_str: String = row.try_get("id").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        let created_at: String = row.try_get("created_at").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        Ok(Message {
            id: Uuid::parse_str(&id_str).map_err(|e| CoreError::validation(e.to_string()))?,
            project_key: row.try_get("project_key").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?,
            sender: row.try_get("sender").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?,
            recipient: row.try_get("recipient").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?,
            subject: row.try_get("subject").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?,
            body: row.try_get("body").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?,
            created_at: crate::adapters::sqlite::parse_datetime(&created_at).map_err(CoreError::from)?,
            read_at: parse_optional_datetime(row.try_get("read_at").ok()).map_err(CoreError::from)?,
            ack_at: parse_optional_datetime(row.try_get("ack_at").ok()).map_err(CoreError::from)?,
        })
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn register_agent(&self, agent: Agent) -> Result<(), CoreError> {
        sqlx::query("INSERT OR REPLACE INTO agents (project_key, name, registered_at) VALUES (?, ?, ?)")
            .bind(&agent.project_key)
            .bind(&agent.name)
            .bind(agent.registered_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        Ok(())
    }

    async fn agent_exists(&self, project_key: &str, name: &str) -> Result<bool, CoreError> {
        let row = sqlx::query("SELECT 1 FROM agents WHERE project_key = ? AND name = ?")
            .bind(project_key)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        Ok(row.is_some())
    }

    async fn insert(&self, message: Message) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO messages (id, project_key, sender, recipient, subject, body, created_at, read_at, ack_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(message.id.to_string())
        .bind(&message.project_key)
        .bind(&message.sender)
        .bind(&message.recipient)
        .bind(&message.subject)
        .bind(&message.body)
        .bind(message.created_at.to_rfc3339())
        .bind(message.read_at.map(|t| t.to_rfc3339()))
        .bind(message.ack_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        Ok(())
    }

    async fn inbox(&self, project_key: &str, recipient: &str) -> Result<Vec<Message>, CoreError> {
        let rows = sqlx::query("SELECT * FROM messages WHERE project_key = ? AND recipient = ? ORDER BY created_at")
            .bind(project_key)
            .bind(recipient)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        rows.iter().map(Self::row_to_message).collect()
    }

    async fn mark_read(&self, project_key: &str, recipient: &str, message_id: Uuid) -> Result<(), CoreError> {
        let result = sqlx::query(
            "UPDATE messages SET read_at = ? WHERE id = ? AND project_key = ? AND recipient = ? AND read_at IS NULL",
        )
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(message_id.to_string())
        .bind(project_key)
        .bind(recipient)
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM messages WHERE id = ? AND project_key = ? AND recipient = ?")
                .bind(message_id.to_string())
                .bind(project_key)
                .bind(recipient)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
            if exists.is_none() {
                return Err(CoreError::not_found(format!("message {message_id}")));
            }
        }
        Ok(())
    }

    async fn mark_acked(&self, project_key: &str, recipient: &str, message_id: Uuid) -> Result<(), CoreError> {
        let result = sqlx::query("UPDATE messages SET ack_at = ? WHERE id = ? AND project_key = ? AND recipient = ?")
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(message_id.to_string())
            .bind(project_key)
            .bind(recipient)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(format!("message {message_id}")));
        }
        Ok(())
    }

    async fn search(&self, project_key: &str, recipient: &str, query: &str) -> Result<Vec<Message>, CoreError> {
        let rows = sqlx::query(
            "SELECT m.* FROM messages m
             JOIN messages_fts ON messages_fts.rowid = m.rowid
             WHERE m.project_key = ? AND m.recipient = ? AND messages_fts MATCH ?
             ORDER BY m.created_at",
        )
        .bind(project_key)
        .bind(recipient)
        .bind(format!("{query}*"))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        rows.iter().map(Self::row_to_message).collect()
    }

    async fn evict_oldest_unread(&self, project_key: &str, recipient: &str) -> Result<Option<Uuid>, CoreError> {
        let row = sqlx::query(
            "SELECT id FROM messages WHERE project_key = ? AND recipient = ? AND read_at IS NULL ORDER BY created_at LIMIT 1",
        )
        .bind(project_key)
        .bind(recipient)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;

        let Some(row) = row else { return Ok(None) };
        let id_str: String = row.try_get("id").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(&id_str)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        Ok(Some(Uuid::parse_str(&id_str).map_err(|e| CoreError::validation(e.to_string()))?))
    }

    async fn unread_count(&self, project_key: &str, recipient: &str) -> Result<usize, CoreError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE project_key = ? AND recipient = ? AND read_at IS NULL")
            .bind(project_key)
            .bind(recipient)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        Ok(row.0 as usize)
    }
}
