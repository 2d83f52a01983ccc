//! Advisory file reservations: agents declare the path globs they intend to
//! touch so others can see in-flight overlap before it becomes a merge
//! conflict. `R1`: grants are always advisory and never block a write.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, instrument, warn};

use crate::config::ReservationConfig;
use crate::domain::reservation::{Reservation, ReservationMode};
use crate::error::CoreError;
use crate::ports::ReservationStore;

pub struct ReservationRegistry {
    store: Arc<dyn ReservationStore>,
    config: ReservationConfig,
}

impl ReservationRegistry {
    pub fn new(store: Arc<dyn ReservationStore>, config: ReservationConfig) -> Self {
        Self { store, config }
    }

    /// Grants a reservation, reporting any currently active reservations it
    /// overlaps. The grant is never refused — overlap is surfaced, not
    /// enforced.
    #[instrument(skip(self, paths))]
    pub async fn reserve(&self, project_key: &str, agent: &str, paths: Vec<String>, mode: ReservationMode, reason: &str) -> Result<(Reservation, Vec<Reservation>), CoreError> {
        let ttl = Duration::seconds(self.config.default_ttl_secs);
        let id = self.store.next_id().await?;
        let reservation = Reservation::new(id, agent, paths, mode, ttl).with_reason(reason);

        let active = self.store.active(project_key, Utc::now()).await?;
        let conflicts: Vec<Reservation> = active.into_iter().filter(|r| r.conflicts_with(&reservation)).collect();

        if !conflicts.is_empty() {
            warn!(agent, reservation_id = id, conflict_count = conflicts.len(), "reservation overlaps active holders");
        }

        self.store.insert(reservation.clone()).await?;
        info!(agent, reservation_id = id, "reservation granted");
        Ok((reservation, conflicts))
    }

    pub async fn active(&self, project_key: &str) -> Result<Vec<Reservation>, CoreError> {
        self.store.active(project_key, Utc::now()).await
    }

    pub async fn release(&self, project_key: &str, reservation_id: u64) -> Result<(), CoreError> {
        self.store.release(project_key, reservation_id).await
    }

    pub async fn release_all_for_agent(&self, project_key: &str, agent: &str) -> Result<usize, CoreError> {
        self.store.release_all_for_agent(project_key, agent).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryReservationStore;

    fn registry() -> ReservationRegistry {
        ReservationRegistry::new(Arc::new(InMemoryReservationStore::new()), ReservationConfig::default())
    }

    #[tokio::test]
    async fn reserve_with_no_active_holders_reports_no_conflicts() {
        let registry = registry();
        let (_, conflicts) = registry.reserve("proj", "agent-a", vec!["src/a.rs".to_string()], ReservationMode::Exclusive, "implementing").await.unwrap();
        assert!(conflicts.is_empty());
    }

    #[tokio::test]
    async fn overlapping_exclusive_reservation_is_reported_but_still_granted() {
        let registry = registry();
        registry.reserve("proj", "agent-a", vec!["src/a.rs".to_string()], ReservationMode::Exclusive, "first").await.unwrap();
        let (granted, conflicts) = registry.reserve("proj", "agent-b", vec!["src/a.rs".to_string()], ReservationMode::Exclusive, "second").await.unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(granted.agent, "agent-b");
    }

    #[tokio::test]
    async fn release_removes_from_active_list() {
        let registry = registry();
        let (reservation, _) = registry.reserve("proj", "agent-a", vec!["src/a.rs".to_string()], ReservationMode::Exclusive, "x").await.unwrap();
        registry.release("proj", reservation.id).await.unwrap();
        assert!(registry.active("proj").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn release_all_for_agent_clears_every_reservation() {
        let registry = registry();
        registry.reserve("proj", "agent-a", vec!["src/a.rs".to_string()], ReservationMode::Shared, "x").await.unwrap();
        registry.reserve("proj", "agent-a", vec!["src/b.rs".to_string()], ReservationMode::Shared, "y").await.unwrap();
        let released = registry.release_all_for_agent("proj", "agent-a").await.unwrap();
        assert_eq!(released, 2);
    }
}
