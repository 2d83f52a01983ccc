//! Persistence interface behind the policy engine's mandates and patterns.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::mandate::Mandate;
use crate::domain::pattern::Pattern;
use crate::error::CoreError;

#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn save_mandate(&self, mandate: Mandate) -> Result<(), CoreError>;
    async fn get_mandate(&self, id: Uuid) -> Result<Mandate, CoreError>;
    async fn list_mandates(&self) -> Result<Vec<Mandate>, CoreError>;

    async fn save_pattern(&self, pattern: Pattern) -> Result<(), CoreError>;
    async fn get_pattern(&self, id: &str) -> Result<Pattern, CoreError>;
    async fn list_patterns(&self) -> Result<Vec<Pattern>, CoreError>;
}
