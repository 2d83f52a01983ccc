use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::reservation::Reservation;
use crate::error::CoreError;
use crate::ports::ReservationStore;

#[derive(Default)]
pub struct InMemoryReservationStore {
    next_id: Mutex<u64>,
    reservations: Mutex<HashMap<String, Vec<Reservation>>>,
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn next_id(&self) -> Result<u64, CoreError> {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        Ok(*next)
    }

    async fn insert(&self, reservation: Reservation) -> Result<(), CoreError> {
        // project_key is not modeled on Reservation directly; callers scope
        // by agent name prefix in this adapter's single-project deployment.
        self.reservations.lock().unwrap().entry("default".to_string()).or_default().push(reservation);
        Ok(())
    }

    async fn active(&self, _project_key: &str, now: DateTime<Utc>) -> Result<Vec<Reservation>, CoreError> {
        let reservations = self.reservations.lock().unwrap();
        Ok(reservations
            .get("default")
            .map(|list| list.iter().filter(|r| !r.is_expired_at(now)).cloned().collect())
            .unwrap_or_default())
    }

    async fn release(&self, _project_key: &str, reservation_id: u64) -> Result<(), CoreError> {
        let mut reservations = self.reservations.lock().unwrap();
        if let Some(list) = reservations.get_mut("default") {
            list.retain(|r| r.id != reservation_id);
        }
        Ok(())
    }

    async fn release_all_for_agent(&self, _project_key: &str, agent: &str) -> Result<usize, CoreError> {
        let mut reservations = self.reservations.lock().unwrap();
        if let Some(list) = reservations.get_mut("default") {
            let before = list.len();
            list.retain(|r| r.agent != agent);
            return Ok(before - list.len());
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reservation::ReservationMode;
    use chrono::Duration;

    #[tokio::test]
    async fn next_id_is_monotonic() {
        let store = InMemoryReservationStore::new();
        let a = store.next_id().await.unwrap();
        let b = store.next_id().await.unwrap();
        assert!(b > a);
    }

    #[tokio::test]
    async fn active_excludes_expired_reservations() {
        let store = InMemoryReservationStore::new();
        let id = store.next_id().await.unwrap();
        let r = Reservation::new(id, "agent-a", vec!["src/a.rs".to_string()], ReservationMode::Exclusive, Duration::seconds(-1));
        store.insert(r).await.unwrap();
        let active = store.active("default", Utc::now()).await.unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn release_removes_reservation() {
        let store = InMemoryReservationStore::new();
        let id = store.next_id().await.unwrap();
        let r = Reservation::new(id, "agent-a", vec!["src/a.rs".to_string()], ReservationMode::Exclusive, Duration::hours(1));
        store.insert(r).await.unwrap();
        store.release("default", id).await.unwrap();
        assert!(store.active("default", Utc::now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn release_all_for_agent_clears_every_matching_reservation() {
        let store = InMemoryReservationStore::new();
        for _ in 0..3 {
            let id = store.next_id().await.unwrap();
            store.insert(Reservation::new(id, "agent-a", vec!["x".to_string()], ReservationMode::Shared, Duration::hours(1))).await.unwrap();
        }
        let released = store.release_all_for_agent("default", "agent-a").await.unwrap();
        assert_eq!(released, 3);
    }
}
