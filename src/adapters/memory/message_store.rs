use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::message::{Agent, Message};
use crate::error::CoreError;
use crate::ports::MessageStore;

#[derive(Default)]
pub struct InMemoryMessageStore {
    agents: Mutex<HashMap<(String, String), Agent>>,
    /// Keyed by (project_key, recipient) -> ordered inbox, oldest first.
    inboxes: Mutex<HashMap<(String, String), Vec<Message>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn register_agent(&self, agent: Agent) -> Result<(), CoreError> {
        let key = (agent.project_key.clone(), agent.name.clone());
        self.agents.lock().unwrap().insert(key, agent);
        Ok(())
    }

    async fn agent_exists(&self, project_key: &str, name: &str) -> Result<bool, CoreError> {
        Ok(self.agents.lock().unwrap().contains_key(&(project_key.to_string(), name.to_string())))
    }

    async fn insert(&self, message: Message) -> Result<(), CoreError> {
        let key = (message.project_key.clone(), message.recipient.clone());
        self.inboxes.lock().unwrap().entry(key).or_default().push(message);
        Ok(())
    }

    async fn inbox(&self, project_key: &str, recipient: &str) -> Result<Vec<Message>, CoreError> {
        let key = (project_key.to_string(), recipient.to_string());
        Ok(self.inboxes.lock().unwrap().get(&key).cloned().unwrap_or_default())
    }

    async fn mark_read(&self, project_key: &str, recipient: &str, message_id: Uuid) -> Result<(), CoreError> {
        let key = (project_key.to_string(), recipient.to_string());
        let mut inboxes = self.inboxes.lock().unwrap();
        let inbox = inboxes.get_mut(&key).ok_or_else(|| CoreError::not_found(format!("inbox for {recipient}")))?;
        let msg = inbox.iter_mut().find(|m| m.id == message_id).ok_or_else(|| CoreError::not_found(format!("message {message_id}")))?;
        msg.mark_read();
        Ok(())
    }

    async fn mark_acked(&self, project_key: &str, recipient: &str, message_id: Uuid) -> Result<(), CoreError> {
        let key = (project_key.to_string(), recipient.to_string());
        let mut inboxes = self.inboxes.lock().unwrap();
        let inbox = inboxes.get_mut(&key).ok_or_else(|| CoreError::not_found(format!("inbox for {recipient}")))?;
        let msg = inbox.iter_mut().find(|m| m.id == message_id).ok_or_else(|| CoreError::not_found(format!("message {message_id}")))?;
        msg.mark_acked();
        Ok(())
    }

    async fn search(&self, project_key: &str, recipient: &str, query: &str) -> Result<Vec<Message>, CoreError> {
        let key = (project_key.to_string(), recipient.to_string());
        let inboxes = self.inboxes.lock().unwrap();
        let query_lower = query.to_lowercase();
        Ok(inboxes
            .get(&key)
            .map(|inbox| {
                inbox
                    .iter()
                    .filter(|m| m.subject.to_lowercase().contains(&query_lower) || m.body.to_lowercase().contains(&query_lower))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn evict_oldest_unread(&self, project_key: &str, recipient: &str) -> Result<Option<Uuid>, CoreError> {
        let key = (project_key.to_string(), recipient.to_string());
        let mut inboxes = self.inboxes.lock().unwrap();
        if let Some(inbox) = inboxes.get_mut(&key) {
            if let Some(pos) = inbox.iter().position(Message::is_unread) {
                return Ok(Some(inbox.remove(pos).id));
            }
        }
        Ok(None)
    }

    async fn unread_count(&self, project_key: &str, recipient: &str) -> Result<usize, CoreError> {
        let key = (project_key.to_string(), recipient.to_string());
        let inboxes = self.inboxes.lock().unwrap();
        Ok(inboxes.get(&key).map(|inbox| inbox.iter().filter(|m| m.is_unread()).count()).unwrap_or(0))
    }
}
