//! Mandates: durable pieces of submitted advice that agents vote on. A
//! mandate's standing is `net = decayed_upvotes - decayed_downvotes`, each
//! vote decayed by age so old opinions matter less than recent ones — a
//! 90-day half-life, shared with pattern maturity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::CoreError;

/// Half-life, in days, used to decay both mandate votes and pattern
/// observations. Chosen once and shared so the two subsystems agree on what
/// "recent" means.
pub const DECAY_HALF_LIFE_DAYS: f64 = 90.0;

/// `net` at or above which a candidate mandate graduates to established.
pub const ESTABLISHED_NET_THRESHOLD: f64 = 2.0;

/// `net` at or above which an established mandate graduates to `mandate`,
/// provided `ratio` also clears [`MANDATE_RATIO_THRESHOLD`].
pub const MANDATE_NET_THRESHOLD: f64 = 5.0;

/// `decayed_upvotes / (decayed_upvotes + decayed_downvotes)` required
/// alongside [`MANDATE_NET_THRESHOLD`] for promotion to `mandate`.
pub const MANDATE_RATIO_THRESHOLD: f64 = 0.7;

/// `net` at or below which any non-rejected mandate is rejected.
pub const REJECTED_NET_THRESHOLD: f64 = -3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    Idea,
    Tip,
    Lore,
    Snippet,
    FeatureRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MandateStatus {
    Candidate,
    Established,
    Mandate,
    Rejected,
}

impl MandateStatus {
    /// `mandate` and `rejected` are terminal: no vote sequence moves a
    /// mandate out of either state.
    pub const fn is_sticky(self) -> bool {
        matches!(self, Self::Mandate | Self::Rejected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteType {
    Upvote,
    Downvote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub id: Uuid,
    pub mandate_id: Uuid,
    pub agent: String,
    pub vote_type: VoteType,
    pub timestamp: DateTime<Utc>,
    /// Vote weight, clamped to `[0.0, 1.0]` at construction.
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mandate {
    pub id: Uuid,
    pub content: String,
    pub content_type: ContentType,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub status: MandateStatus,
    pub tags: Vec<String>,
    pub metadata: Option<Value>,
    pub votes: Vec<Vote>,
}

impl Mandate {
    pub fn new(content: impl Into<String>, content_type: ContentType, author: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            content_type,
            author: author.into(),
            created_at: Utc::now(),
            status: MandateStatus::Candidate,
            tags: Vec::new(),
            metadata: None,
            votes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// `V1`: at most one vote per (mandate, agent). A second vote from an
    /// agent already on record is rejected rather than replacing the first.
    pub fn cast_vote(&mut self, agent: impl Into<String>, vote_type: VoteType, weight: f64) -> Result<(), CoreError> {
        let agent = agent.into();
        if self.votes.iter().any(|v| v.agent == agent) {
            return Err(CoreError::conflict(format!("agent '{agent}' already voted on mandate {}", self.id)));
        }
        self.votes.push(Vote {
            id: Uuid::new_v4(),
            mandate_id: self.id,
            agent,
            vote_type,
            timestamp: Utc::now(),
            weight: weight.clamp(0.0, 1.0),
        });
        self.reassess();
        Ok(())
    }

    /// Exponential half-life decay: a vote's weight halves every
    /// [`DECAY_HALF_LIFE_DAYS`] days since it was cast.
    pub fn decay_weight(age_days: f64) -> f64 {
        0.5_f64.powf(age_days / DECAY_HALF_LIFE_DAYS)
    }

    fn decayed_votes_at(&self, now: DateTime<Utc>) -> (f64, f64) {
        let mut decayed_upvotes = 0.0;
        let mut decayed_downvotes = 0.0;
        for vote in &self.votes {
            let age_days = (now - vote.timestamp).num_seconds() as f64 / 86_400.0;
            let decayed = vote.weight * Self::decay_weight(age_days.max(0.0));
            match vote.vote_type {
                VoteType::Upvote => decayed_upvotes += decayed,
                VoteType::Downvote => decayed_downvotes += decayed,
            }
        }
        (decayed_upvotes, decayed_downvotes)
    }

    pub fn net_at(&self, now: DateTime<Utc>) -> f64 {
        let (up, down) = self.decayed_votes_at(now);
        up - down
    }

    pub fn net(&self) -> f64 {
        self.net_at(Utc::now())
    }

    pub fn ratio_at(&self, now: DateTime<Utc>) -> f64 {
        let (up, down) = self.decayed_votes_at(now);
        if up + down == 0.0 {
            0.0
        } else {
            up / (up + down)
        }
    }

    pub fn ratio(&self) -> f64 {
        self.ratio_at(Utc::now())
    }

    /// Re-evaluates `status` against the current decayed `net`/`ratio`,
    /// advancing through as many transitions as the current score clears in
    /// one pass. `mandate` and `rejected` are sticky and never reconsidered.
    pub fn reassess(&mut self) {
        self.reassess_at(Utc::now());
    }

    fn reassess_at(&mut self, now: DateTime<Utc>) {
        loop {
            if self.status.is_sticky() {
                return;
            }
            let net = self.net_at(now);
            let ratio = self.ratio_at(now);
            let next = if net <= REJECTED_NET_THRESHOLD {
                MandateStatus::Rejected
            } else {
                match self.status {
                    MandateStatus::Candidate if net >= ESTABLISHED_NET_THRESHOLD => MandateStatus::Established,
                    MandateStatus::Established if net >= MANDATE_NET_THRESHOLD && ratio >= MANDATE_RATIO_THRESHOLD => MandateStatus::Mandate,
                    other => other,
                }
            };
            if next == self.status {
                return;
            }
            self.status = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mandate() -> Mandate {
        Mandate::new("batch writes under load", ContentType::Tip, "alice")
    }

    fn vote_at(mandate: &mut Mandate, agent: &str, vote_type: VoteType, age_days: f64) {
        mandate.votes.push(Vote {
            id: Uuid::new_v4(),
            mandate_id: mandate.id,
            agent: agent.to_string(),
            vote_type,
            timestamp: Utc::now() - chrono::Duration::seconds((age_days * 86_400.0) as i64),
            weight: 1.0,
        });
    }

    #[test]
    fn new_mandate_starts_candidate() {
        assert_eq!(mandate().status, MandateStatus::Candidate);
    }

    #[test]
    fn duplicate_vote_from_same_agent_is_rejected_and_leaves_votes_unchanged() {
        let mut m = mandate();
        m.cast_vote("a", VoteType::Upvote, 1.0).unwrap();
        let err = m.cast_vote("a", VoteType::Downvote, 1.0).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
        assert_eq!(m.votes.len(), 1);
        assert_eq!(m.votes[0].vote_type, VoteType::Upvote);
    }

    #[test]
    fn six_upvotes_promote_candidate_to_mandate() {
        let mut m = mandate();
        for agent in ["a", "b", "c", "d", "e", "f"] {
            m.cast_vote(agent, VoteType::Upvote, 1.0).unwrap();
        }
        assert_eq!(m.status, MandateStatus::Mandate);
        assert!(m.net() >= 5.0);
        assert!((m.ratio() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn mandate_status_is_sticky_against_a_later_downvote() {
        let mut m = mandate();
        for agent in ["a", "b", "c", "d", "e", "f"] {
            m.cast_vote(agent, VoteType::Upvote, 1.0).unwrap();
        }
        assert_eq!(m.status, MandateStatus::Mandate);
        m.cast_vote("g", VoteType::Downvote, 1.0).unwrap();
        assert_eq!(m.status, MandateStatus::Mandate);
    }

    #[test]
    fn rejected_status_is_sticky_against_a_later_upvote() {
        let mut m = mandate();
        for agent in ["a", "b", "c"] {
            m.cast_vote(agent, VoteType::Downvote, 1.0).unwrap();
        }
        assert_eq!(m.status, MandateStatus::Rejected);
        m.cast_vote("d", VoteType::Upvote, 1.0).unwrap();
        assert_eq!(m.status, MandateStatus::Rejected);
    }

    #[test]
    fn net_le_reject_threshold_rejects_even_from_established() {
        let mut m = mandate();
        for agent in ["a", "b"] {
            m.cast_vote(agent, VoteType::Upvote, 1.0).unwrap();
        }
        assert_eq!(m.status, MandateStatus::Established);
        for agent in ["c", "d", "e"] {
            m.cast_vote(agent, VoteType::Downvote, 1.0).unwrap();
        }
        assert_eq!(m.status, MandateStatus::Rejected);
    }

    #[test]
    fn decay_weight_is_one_at_zero_age() {
        assert!((Mandate::decay_weight(0.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn decay_weight_halves_at_half_life() {
        let w = Mandate::decay_weight(DECAY_HALF_LIFE_DAYS);
        assert!((w - 0.5).abs() < 0.02);
    }

    #[test]
    fn stale_upvote_no_longer_dominates_recent_downvote() {
        let mut m = mandate();
        vote_at(&mut m, "old", VoteType::Upvote, 400.0);
        vote_at(&mut m, "new", VoteType::Downvote, 0.0);
        assert!(m.net_at(Utc::now()) < 0.0);
    }
}
