//! Inter-agent message bus: agent registration, send/inbox, and the
//! oldest-unread eviction policy that keeps an inbox bounded.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::domain::message::{Agent, Message, MAX_INBOX_LIMIT};
use crate::error::CoreError;
use crate::ports::MessageStore;

const ADJECTIVES: &[&str] = &["swift", "quiet", "bold", "calm", "keen", "brisk", "vivid", "stern"];
const NOUNS: &[&str] = &["falcon", "otter", "cedar", "ridge", "quartz", "ember", "harbor", "thicket"];
const MAX_NAME_RETRIES: u32 = 20;

pub struct MessageBus {
    store: Arc<dyn MessageStore>,
}

impl MessageBus {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Registers an agent under a caller-supplied name, or generates one if
    /// `name` is `None`. Generated names are `adjective-noun` pairs; after
    /// [`MAX_NAME_RETRIES`] collisions within a project, a uuid suffix is
    /// appended so registration never blocks on name exhaustion.
    #[instrument(skip(self))]
    pub async fn register_agent(&self, project_key: &str, name: Option<String>) -> Result<Agent, CoreError> {
        let name = match name {
            Some(name) => {
                if self.store.agent_exists(project_key, &name).await? {
                    return Err(CoreError::conflict(format!("agent {name} already registered")));
                }
                name
            }
            None => self.generate_unique_name(project_key).await?,
        };

        let agent = Agent { name, project_key: project_key.to_string(), registered_at: chrono::Utc::now() };
        self.store.register_agent(agent.clone()).await?;
        info!(agent = %agent.name, project_key, "agent registered");
        Ok(agent)
    }

    async fn generate_unique_name(&self, project_key: &str) -> Result<String, CoreError> {
        for attempt in 0..MAX_NAME_RETRIES {
            let adjective = ADJECTIVES[(attempt as usize) % ADJECTIVES.len()];
            let noun = NOUNS[(attempt as usize / ADJECTIVES.len()) % NOUNS.len()];
            let candidate = format!("{adjective}-{noun}");
            if !self.store.agent_exists(project_key, &candidate).await? {
                return Ok(candidate);
            }
        }
        warn!(project_key, "exhausted adjective-noun name pool, falling back to uuid suffix");
        Ok(format!("agent-{}", uuid::Uuid::new_v4()))
    }

    /// Sends a message, fanning out across `recipients` as one row per
    /// recipient so each has independent read/ack state. Evicts the oldest
    /// unread message for any recipient whose inbox would otherwise exceed
    /// [`MAX_INBOX_LIMIT`].
    #[instrument(skip(self, body))]
    pub async fn send(&self, project_key: &str, sender: &str, recipients: &[String], subject: &str, body: &str) -> Result<Vec<Message>, CoreError> {
        let mut sent = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let message = Message::new(project_key, sender, recipient, subject, body);
            self.enforce_inbox_limit(project_key, recipient).await?;
            self.store.insert(message.clone()).await?;
            sent.push(message);
        }
        Ok(sent)
    }

    async fn enforce_inbox_limit(&self, project_key: &str, recipient: &str) -> Result<(), CoreError> {
        let count = self.store.unread_count(project_key, recipient).await?;
        if count >= MAX_INBOX_LIMIT {
            if let Some(evicted) = self.store.evict_oldest_unread(project_key, recipient).await? {
                warn!(recipient, %evicted, "inbox at capacity, evicted oldest unread message");
            }
        }
        Ok(())
    }

    pub async fn inbox(&self, project_key: &str, recipient: &str) -> Result<Vec<Message>, CoreError> {
        self.store.inbox(project_key, recipient).await
    }

    pub async fn mark_read(&self, project_key: &str, recipient: &str, message_id: uuid::Uuid) -> Result<(), CoreError> {
        self.store.mark_read(project_key, recipient, message_id).await
    }

    pub async fn mark_acked(&self, project_key: &str, recipient: &str, message_id: uuid::Uuid) -> Result<(), CoreError> {
        self.store.mark_acked(project_key, recipient, message_id).await
    }

    pub async fn search(&self, project_key: &str, recipient: &str, query: &str) -> Result<Vec<Message>, CoreError> {
        self.store.search(project_key, recipient, query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryMessageStore;

    fn bus() -> MessageBus {
        MessageBus::new(Arc::new(InMemoryMessageStore::new()))
    }

    #[tokio::test]
    async fn register_with_explicit_name_rejects_duplicate() {
        let bus = bus();
        bus.register_agent("proj", Some("alice".to_string())).await.unwrap();
        let err = bus.register_agent("proj", Some("alice".to_string())).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn register_without_name_generates_one() {
        let bus = bus();
        let agent = bus.register_agent("proj", None).await.unwrap();
        assert!(agent.name.contains('-'));
    }

    #[tokio::test]
    async fn generated_names_do_not_collide_within_pool() {
        let bus = bus();
        let mut names = std::collections::HashSet::new();
        for _ in 0..5 {
            let agent = bus.register_agent("proj", None).await.unwrap();
            assert!(names.insert(agent.name));
        }
    }

    #[tokio::test]
    async fn send_fans_out_one_row_per_recipient() {
        let bus = bus();
        bus.register_agent("proj", Some("alice".to_string())).await.unwrap();
        bus.send("proj", "alice", &["bob".to_string(), "carol".to_string()], "hi", "body").await.unwrap();
        assert_eq!(bus.inbox("proj", "bob").await.unwrap().len(), 1);
        assert_eq!(bus.inbox("proj", "carol").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn inbox_over_limit_evicts_oldest_unread() {
        let bus = bus();
        for i in 0..(MAX_INBOX_LIMIT + 1) {
            bus.send("proj", "alice", &["bob".to_string()], &format!("msg {i}"), "body").await.unwrap();
        }
        let inbox = bus.inbox("proj", "bob").await.unwrap();
        assert_eq!(inbox.len(), MAX_INBOX_LIMIT);
        assert_eq!(inbox[0].subject, "msg 1");
    }
}
