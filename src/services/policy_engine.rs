//! Mandate consensus and pattern maturity, the two halves of the policy
//! engine: mandates are voted on by agents, patterns are inferred from
//! observed outcomes. Both reassess via the same decay-weighted scoring,
//! and persistently harmful patterns get automatically inverted into
//! anti-patterns.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::mandate::{ContentType, Mandate, MandateStatus, VoteType};
use crate::domain::pattern::{MaturityState, ObservationKind, Pattern};
use crate::error::CoreError;
use crate::ports::PolicyStore;

pub struct PolicyEngine {
    store: Arc<dyn PolicyStore>,
}

impl PolicyEngine {
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self { store }
    }

    pub async fn propose_mandate(&self, content: &str, content_type: ContentType, author: &str) -> Result<Mandate, CoreError> {
        let mandate = Mandate::new(content, content_type, author);
        self.store.save_mandate(mandate.clone()).await?;
        Ok(mandate)
    }

    #[instrument(skip(self))]
    pub async fn cast_vote(&self, mandate_id: Uuid, agent: &str, vote_type: VoteType, weight: f64) -> Result<Mandate, CoreError> {
        let mut mandate = self.store.get_mandate(mandate_id).await?;
        mandate.cast_vote(agent, vote_type, weight)?;
        self.store.save_mandate(mandate.clone()).await?;
        if mandate.status == MandateStatus::Mandate {
            info!(mandate_id = %mandate_id, net = mandate.net(), ratio = mandate.ratio(), "mandate reached consensus");
        }
        Ok(mandate)
    }

    pub async fn adopted_mandates(&self) -> Result<Vec<Mandate>, CoreError> {
        Ok(self.store.list_mandates().await?.into_iter().filter(|m| m.status == MandateStatus::Mandate).collect())
    }

    pub async fn observe_pattern(&self, content: &str, tags: Vec<String>) -> Result<Pattern, CoreError> {
        let pattern = Pattern::new(content, tags);
        self.store.save_pattern(pattern.clone()).await?;
        Ok(pattern)
    }

    /// Records an observation, reassesses maturity, and — if the pattern has
    /// accumulated enough raw failures — persists an inverted anti-pattern
    /// alongside it rather than mutating the original.
    #[instrument(skip(self))]
    pub async fn record_observation(&self, pattern_id: &str, kind: ObservationKind) -> Result<Pattern, CoreError> {
        let mut pattern = self.store.get_pattern(pattern_id).await?;
        pattern.record_observation(kind);
        self.store.save_pattern(pattern.clone()).await?;

        if let Some(anti_pattern) = pattern.invert() {
            warn!(pattern_id = %pattern.id, anti_pattern_id = %anti_pattern.id, reason = ?anti_pattern.reason, "pattern inverted to anti-pattern");
            self.store.save_pattern(anti_pattern).await?;
        }

        Ok(pattern)
    }

    /// Guidance to surface to an agent, grouped by maturity state: proven and
    /// established patterns render as "Follow:" text, deprecated patterns and
    /// anti-patterns render with explicit avoidance language. Candidates (not
    /// enough feedback yet) are omitted.
    pub async fn guidance(&self) -> Result<Vec<String>, CoreError> {
        let mut patterns = self.store.list_patterns().await?;
        patterns.sort_by_key(|p| maturity_rank(p.maturity.state));
        Ok(patterns.iter().filter_map(Pattern::render).collect())
    }
}

fn maturity_rank(state: MaturityState) -> u8 {
    match state {
        MaturityState::Proven => 0,
        MaturityState::Established => 1,
        MaturityState::Deprecated => 2,
        MaturityState::Candidate => 3,
    }
}
