//! Persistence interface behind the reservation registry.

use async_trait::async_trait;

use crate::domain::reservation::Reservation;
use crate::error::CoreError;

#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn next_id(&self) -> Result<u64, CoreError>;
    async fn insert(&self, reservation: Reservation) -> Result<(), CoreError>;
    async fn active(&self, project_key: &str, now: chrono::DateTime<chrono::Utc>) -> Result<Vec<Reservation>, CoreError>;
    async fn release(&self, project_key: &str, reservation_id: u64) -> Result<(), CoreError>;
    async fn release_all_for_agent(&self, project_key: &str, agent: &str) -> Result<usize, CoreError>;
}
