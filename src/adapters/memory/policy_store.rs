use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::mandate::Mandate;
use crate::domain::pattern::Pattern;
use crate::error::CoreError;
use crate::ports::PolicyStore;

#[derive(Default)]
pub struct InMemoryPolicyStore {
    mandates: Mutex<HashMap<Uuid, Mandate>>,
    patterns: Mutex<HashMap<String, Pattern>>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn save_mandate(&self, mandate: Mandate) -> Result<(), CoreError> {
        self.mandates.lock().unwrap().insert(mandate.id, mandate);
        Ok(())
    }

    async fn get_mandate(&self, id: Uuid) -> Result<Mandate, CoreError> {
        self.mandates.lock().unwrap().get(&id).cloned().ok_or_else(|| CoreError::not_found(format!("mandate {id}")))
    }

    async fn list_mandates(&self) -> Result<Vec<Mandate>, CoreError> {
        Ok(self.mandates.lock().unwrap().values().cloned().collect())
    }

    async fn save_pattern(&self, pattern: Pattern) -> Result<(), CoreError> {
        self.patterns.lock().unwrap().insert(pattern.id.clone(), pattern);
        Ok(())
    }

    async fn get_pattern(&self, id: &str) -> Result<Pattern, CoreError> {
        self.patterns.lock().unwrap().get(id).cloned().ok_or_else(|| CoreError::not_found(format!("pattern {id}")))
    }

    async fn list_patterns(&self) -> Result<Vec<Pattern>, CoreError> {
        Ok(self.patterns.lock().unwrap().values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mandate::{ContentType, VoteType};

    #[tokio::test]
    async fn save_and_get_mandate_round_trips() {
        let store = InMemoryPolicyStore::new();
        let mut mandate = Mandate::new("t", ContentType::Tip, "alice");
        mandate.cast_vote("a", VoteType::Upvote, 1.0).unwrap();
        let id = mandate.id;
        store.save_mandate(mandate).await.unwrap();
        let fetched = store.get_mandate(id).await.unwrap();
        assert_eq!(fetched.votes.len(), 1);
    }

    #[tokio::test]
    async fn missing_mandate_is_not_found() {
        let store = InMemoryPolicyStore::new();
        assert!(matches!(store.get_mandate(Uuid::new_v4()).await, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn list_mandates_returns_all_saved() {
        let store = InMemoryPolicyStore::new();
        store.save_mandate(Mandate::new("a", ContentType::Idea, "alice")).await.unwrap();
        store.save_mandate(Mandate::new("b", ContentType::Idea, "bob")).await.unwrap();
        assert_eq!(store.list_mandates().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn save_and_get_pattern_round_trips() {
        let store = InMemoryPolicyStore::new();
        let pattern = Pattern::new("batch writes", Vec::new());
        let id = pattern.id.clone();
        store.save_pattern(pattern).await.unwrap();
        let fetched = store.get_pattern(&id).await.unwrap();
        assert_eq!(fetched.content, "batch writes");
    }

    #[tokio::test]
    async fn list_patterns_returns_all_saved() {
        let store = InMemoryPolicyStore::new();
        store.save_pattern(Pattern::new("a", Vec::new())).await.unwrap();
        store.save_pattern(Pattern::new("b", Vec::new())).await.unwrap();
        assert_eq!(store.list_patterns().await.unwrap().len(), 2);
    }
}
