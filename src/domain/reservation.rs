//! File reservations: advisory claims an agent holds over a set of path globs
//! while it works, so other agents can see (and avoid) in-flight overlap.
//! Grants are always advisory — `R1`: holding a reservation never blocks
//! another agent from writing the same paths, it only makes the collision
//! observable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationMode {
    Exclusive,
    Shared,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    /// Monotonic per-project sequence number; the tie-break for "who held it
    /// first" when reporting overlapping reservations.
    pub id: u64,
    pub agent: String,
    pub paths: Vec<String>,
    pub mode: ReservationMode,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(id: u64, agent: impl Into<String>, paths: Vec<String>, mode: ReservationMode, ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            id,
            agent: agent.into(),
            paths,
            mode,
            reason: String::new(),
            created_at: now,
            expires_at: now + ttl,
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// `R2`: two reservations conflict only if at least one is exclusive and
    /// their path sets overlap; two shared reservations never conflict.
    pub fn conflicts_with(&self, other: &Self) -> bool {
        if self.mode == ReservationMode::Shared && other.mode == ReservationMode::Shared {
            return false;
        }
        self.paths.iter().any(|p| other.paths.iter().any(|q| glob_overlaps(p, q)))
    }
}

/// `R3`: a glob overlap check shared with the decomposition planner's plan
/// validation so "does this reservation collide" and "does this plan collide"
/// use the same definition of overlap.
pub fn glob_overlaps(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let a_prefix = a.trim_end_matches('*');
    let b_prefix = b.trim_end_matches('*');
    a_prefix.starts_with(b_prefix) || b_prefix.starts_with(a_prefix)
}
