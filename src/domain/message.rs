//! Inter-agent messages and the agents that send/receive them.
//!
//! `M1`: a message fans out to one row per recipient so each recipient's
//! read/ack state is independent. `M2`: an inbox is bounded — the oldest
//! unread message is dropped once a recipient's inbox exceeds the limit,
//! never the newest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of unread messages retained per recipient inbox.
pub const MAX_INBOX_LIMIT: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub name: String,
    pub project_key: String,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub project_key: String,
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    pub ack_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(project_key: impl Into<String>, sender: impl Into<String>, recipient: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_key: project_key.into(),
            sender: sender.into(),
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
            created_at: Utc::now(),
            read_at: None,
            ack_at: None,
        }
    }

    pub fn mark_read(&mut self) {
        if self.read_at.is_none() {
            self.read_at = Some(Utc::now());
        }
    }

    pub fn mark_acked(&mut self) {
        self.ack_at = Some(Utc::now());
    }

    pub const fn is_unread(&self) -> bool {
        self.read_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_is_unread() {
        let msg = Message::new("proj", "alice", "bob", "hi", "body");
        assert!(msg.is_unread());
        assert!(msg.ack_at.is_none());
    }

    #[test]
    fn mark_read_is_idempotent() {
        let mut msg = Message::new("proj", "alice", "bob", "hi", "body");
        msg.mark_read();
        let first = msg.read_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        msg.mark_read();
        assert_eq!(msg.read_at, first);
    }

    #[test]
    fn mark_acked_sets_timestamp() {
        let mut msg = Message::new("proj", "alice", "bob", "hi", "body");
        msg.mark_acked();
        assert!(msg.ack_at.is_some());
    }
}
