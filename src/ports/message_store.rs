//! Persistence interface behind the message bus.

use async_trait::async_trait;

use crate::domain::message::{Agent, Message};
use crate::error::CoreError;

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn register_agent(&self, agent: Agent) -> Result<(), CoreError>;
    async fn agent_exists(&self, project_key: &str, name: &str) -> Result<bool, CoreError>;
    async fn insert(&self, message: Message) -> Result<(), CoreError>;
    async fn inbox(&self, project_key: &str, recipient: &str) -> Result<Vec<Message>, CoreError>;
    async fn mark_read(&self, project_key: &str, recipient: &str, message_id: uuid::Uuid) -> Result<(), CoreError>;
    async fn mark_acked(&self, project_key: &str, recipient: &str, message_id: uuid::Uuid) -> Result<(), CoreError>;
    async fn search(&self, project_key: &str, recipient: &str, query: &str) -> Result<Vec<Message>, CoreError>;
    /// Drops the oldest unread message for a recipient, returning its id if one existed.
    async fn evict_oldest_unread(&self, project_key: &str, recipient: &str) -> Result<Option<uuid::Uuid>, CoreError>;
    async fn unread_count(&self, project_key: &str, recipient: &str) -> Result<usize, CoreError>;
}
