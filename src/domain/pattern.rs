//! Observed decomposition patterns and their maturity state machine.
//!
//! A pattern starts as a `Candidate`, graduates to `Established` and then
//! `Proven` as decay-weighted helpful observations accumulate, and is
//! demoted to `Deprecated` if harmful observations dominate. Separately,
//! a pattern whose *raw* (undecayed) failure rate crosses a threshold is
//! automatically inverted into a standalone anti-pattern — the original is
//! kept, not replaced.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::mandate::Mandate;

/// Bound on `example_cells`: oldest is evicted once this many are recorded.
pub const MAX_EXAMPLE_CELLS: usize = 10;

/// Decayed total observations below which a pattern remains a candidate.
pub const MIN_FEEDBACK: f64 = 3.0;

/// Decayed helpful observations at or above which a pattern can graduate to
/// `proven`, provided its decayed harmful ratio also clears [`MAX_HARMFUL_RATIO`].
pub const MIN_HELPFUL: f64 = 5.0;

/// Decayed harmful-observation ratio at or below which `proven` is reachable.
pub const MAX_HARMFUL_RATIO: f64 = 0.15;

/// Decayed harmful-observation ratio at or above which a pattern is
/// deprecated, overriding a `proven` graduation.
pub const DEPRECATION_THRESHOLD: f64 = 0.30;

/// Raw (undecayed) total observations required before automatic inversion
/// is considered at all.
pub const MIN_OBSERVATIONS_FOR_INVERSION: usize = 3;

/// Raw (undecayed) failure rate at or above which a pattern is inverted.
pub const INVERSION_FAILURE_RATE: f64 = 0.60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternKind {
    Pattern,
    AntiPattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaturityState {
    Candidate,
    Established,
    Proven,
    Deprecated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObservationKind {
    Helpful,
    Harmful,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternObservation {
    pub kind: ObservationKind,
    pub observed_at: DateTime<Utc>,
}

/// The decay-weighted maturity ledger for a pattern. Kept as a nested
/// struct (rather than flattened onto [`Pattern`]) because it is the part
/// that is recomputed on every observation while the pattern's identity
/// fields are not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Maturity {
    pub state: MaturityState,
    pub helpful_count: f64,
    pub harmful_count: f64,
    pub last_validated: DateTime<Utc>,
    pub promoted_at: Option<DateTime<Utc>>,
    pub deprecated_at: Option<DateTime<Utc>>,
}

impl Maturity {
    fn new(now: DateTime<Utc>) -> Self {
        Self { state: MaturityState::Candidate, helpful_count: 0.0, harmful_count: 0.0, last_validated: now, promoted_at: None, deprecated_at: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    pub content: String,
    pub kind: PatternKind,
    pub is_negative: bool,
    pub success_count: u32,
    pub failure_count: u32,
    pub tags: Vec<String>,
    pub example_cells: VecDeque<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub observations: Vec<PatternObservation>,
    pub maturity: Maturity,
}

impl Pattern {
    pub fn new(content: impl Into<String>, tags: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            kind: PatternKind::Pattern,
            is_negative: false,
            success_count: 0,
            failure_count: 0,
            tags,
            example_cells: VecDeque::new(),
            created_at: now,
            updated_at: now,
            reason: None,
            observations: Vec::new(),
            maturity: Maturity::new(now),
        }
    }

    /// Appends an example cell id, evicting the oldest once more than
    /// [`MAX_EXAMPLE_CELLS`] are on file.
    pub fn add_example_cell(&mut self, cell_id: impl Into<String>) {
        self.example_cells.push_back(cell_id.into());
        while self.example_cells.len() > MAX_EXAMPLE_CELLS {
            self.example_cells.pop_front();
        }
        self.updated_at = Utc::now();
    }

    /// Records a raw helpful/harmful observation, bumps the matching raw
    /// counter, and reassesses maturity against the decayed stream.
    pub fn record_observation(&mut self, kind: ObservationKind) {
        let now = Utc::now();
        match kind {
            ObservationKind::Helpful => self.success_count += 1,
            ObservationKind::Harmful => self.failure_count += 1,
        }
        self.observations.push(PatternObservation { kind, observed_at: now });
        self.updated_at = now;
        self.reassess_at(now);
    }

    fn decayed_counts_at(&self, now: DateTime<Utc>) -> (f64, f64) {
        let mut helpful = 0.0;
        let mut harmful = 0.0;
        for obs in &self.observations {
            let age_days = (now - obs.observed_at).num_seconds() as f64 / 86_400.0;
            let weight = Mandate::decay_weight(age_days.max(0.0));
            match obs.kind {
                ObservationKind::Helpful => helpful += weight,
                ObservationKind::Harmful => harmful += weight,
            }
        }
        (helpful, harmful)
    }

    pub fn reassess(&mut self) {
        self.reassess_at(Utc::now());
    }

    fn reassess_at(&mut self, now: DateTime<Utc>) {
        let (helpful, harmful) = self.decayed_counts_at(now);
        self.maturity.helpful_count = helpful;
        self.maturity.harmful_count = harmful;
        self.maturity.last_validated = now;

        let total = helpful + harmful;
        let harmful_ratio = if total == 0.0 { 0.0 } else { harmful / total };

        let next = if total < MIN_FEEDBACK {
            MaturityState::Candidate
        } else if harmful_ratio >= DEPRECATION_THRESHOLD {
            MaturityState::Deprecated
        } else if helpful >= MIN_HELPFUL && harmful_ratio <= MAX_HARMFUL_RATIO {
            MaturityState::Proven
        } else {
            MaturityState::Established
        };

        if next == MaturityState::Proven && self.maturity.promoted_at.is_none() {
            self.maturity.promoted_at = Some(now);
        }
        if next == MaturityState::Deprecated && self.maturity.deprecated_at.is_none() {
            self.maturity.deprecated_at = Some(now);
        }
        self.maturity.state = next;
    }

    /// `shouldInvertPattern`: true when this is not already an anti-pattern
    /// and its *raw* (undecayed) observations clear [`MIN_OBSERVATIONS_FOR_INVERSION`]
    /// with a raw failure rate at or above [`INVERSION_FAILURE_RATE`].
    pub fn should_invert(&self) -> bool {
        if self.kind == PatternKind::AntiPattern {
            return false;
        }
        let total = self.success_count + self.failure_count;
        if (total as usize) < MIN_OBSERVATIONS_FOR_INVERSION {
            return false;
        }
        f64::from(self.failure_count) / f64::from(total) >= INVERSION_FAILURE_RATE
    }

    /// Emits the anti-pattern copy when [`Self::should_invert`] holds.
    /// The original pattern is left untouched — inversion is non-destructive.
    pub fn invert(&self) -> Option<Pattern> {
        if !self.should_invert() {
            return None;
        }
        let total = self.success_count + self.failure_count;
        let pct = (f64::from(self.failure_count) / f64::from(total) * 100.0).round();
        let now = Utc::now();
        Some(Pattern {
            id: format!("anti-{}", self.id),
            content: format!("AVOID: {}", strip_directive_prefix(&self.content)),
            kind: PatternKind::AntiPattern,
            is_negative: true,
            success_count: self.success_count,
            failure_count: self.failure_count,
            tags: self.tags.clone(),
            example_cells: self.example_cells.clone(),
            created_at: now,
            updated_at: now,
            reason: Some(format!("{}/{} ({}%)", self.failure_count, total, pct)),
            observations: Vec::new(),
            maturity: Maturity::new(now),
        })
    }

    /// How this pattern should be rendered to an agent consulting the policy
    /// engine, grouped implicitly by [`MaturityState`] at the call site.
    pub fn render(&self) -> Option<String> {
        match self.kind {
            PatternKind::AntiPattern => Some(format!("AVOID: {}", self.content)),
            PatternKind::Pattern => match self.maturity.state {
                MaturityState::Proven | MaturityState::Established => Some(format!("Follow: {}", self.content)),
                MaturityState::Deprecated => Some(format!("AVOID (deprecated): {}", self.content)),
                MaturityState::Candidate => None,
            },
        }
    }
}

fn strip_directive_prefix(content: &str) -> &str {
    for prefix in ["AVOID:", "DO NOT:", "NEVER:"] {
        if let Some(rest) = content.strip_prefix(prefix) {
            return rest.trim_start();
        }
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern() -> Pattern {
        Pattern::new("batch writes under load", vec!["perf".to_string()])
    }

    fn observe_n_days_ago(p: &mut Pattern, kind: ObservationKind, age_days: f64) {
        let observed_at = Utc::now() - chrono::Duration::seconds((age_days * 86_400.0) as i64);
        match kind {
            ObservationKind::Helpful => p.success_count += 1,
            ObservationKind::Harmful => p.failure_count += 1,
        }
        p.observations.push(PatternObservation { kind, observed_at });
        p.reassess_at(Utc::now());
    }

    #[test]
    fn new_pattern_starts_candidate() {
        assert_eq!(pattern().maturity.state, MaturityState::Candidate);
    }

    #[test]
    fn enough_helpful_observations_reach_proven() {
        let mut p = pattern();
        for _ in 0..5 {
            p.record_observation(ObservationKind::Helpful);
        }
        assert_eq!(p.maturity.state, MaturityState::Proven);
        assert!(p.maturity.promoted_at.is_some());
    }

    #[test]
    fn promoted_at_is_not_overwritten_by_later_observations() {
        let mut p = pattern();
        for _ in 0..5 {
            p.record_observation(ObservationKind::Helpful);
        }
        let first = p.maturity.promoted_at;
        p.record_observation(ObservationKind::Helpful);
        assert_eq!(p.maturity.promoted_at, first);
    }

    #[test]
    fn high_harmful_ratio_deprecates_even_with_enough_helpful() {
        let mut p = pattern();
        for _ in 0..5 {
            p.record_observation(ObservationKind::Helpful);
        }
        for _ in 0..5 {
            p.record_observation(ObservationKind::Harmful);
        }
        assert_eq!(p.maturity.state, MaturityState::Deprecated);
        assert!(p.maturity.deprecated_at.is_some());
    }

    #[test]
    fn deprecated_at_is_not_overwritten() {
        let mut p = pattern();
        for _ in 0..5 {
            p.record_observation(ObservationKind::Helpful);
        }
        for _ in 0..5 {
            p.record_observation(ObservationKind::Harmful);
        }
        let first = p.maturity.deprecated_at;
        p.record_observation(ObservationKind::Harmful);
        assert_eq!(p.maturity.deprecated_at, first);
    }

    #[test]
    fn three_observations_decayed_across_a_half_life_stay_below_min_feedback() {
        let mut p = pattern();
        for _ in 0..3 {
            observe_n_days_ago(&mut p, ObservationKind::Helpful, DECAY_HALF_LIFE_DAYS_FOR_TEST);
        }
        assert!(p.maturity.helpful_count < MIN_FEEDBACK);
        assert_eq!(p.maturity.state, MaturityState::Candidate);
    }

    const DECAY_HALF_LIFE_DAYS_FOR_TEST: f64 = 180.0;

    #[test]
    fn should_invert_requires_minimum_raw_observations() {
        let mut p = pattern();
        p.record_observation(ObservationKind::Harmful);
        p.record_observation(ObservationKind::Harmful);
        assert!(!p.should_invert());
    }

    #[test]
    fn should_invert_true_at_sixty_percent_raw_failure_rate() {
        let mut p = pattern();
        for _ in 0..7 {
            p.record_observation(ObservationKind::Harmful);
        }
        for _ in 0..3 {
            p.record_observation(ObservationKind::Helpful);
        }
        assert!(p.should_invert());
    }

    #[test]
    fn anti_pattern_kind_never_inverts_regardless_of_counts() {
        let mut p = pattern();
        p.kind = PatternKind::AntiPattern;
        for _ in 0..10 {
            p.record_observation(ObservationKind::Harmful);
        }
        assert!(!p.should_invert());
    }

    #[test]
    fn invert_produces_avoid_prefixed_copy_with_anti_id_and_stats_reason() {
        let mut p = pattern();
        for _ in 0..7 {
            p.record_observation(ObservationKind::Harmful);
        }
        for _ in 0..3 {
            p.record_observation(ObservationKind::Helpful);
        }
        let anti = p.invert().unwrap();
        assert_eq!(anti.id, format!("anti-{}", p.id));
        assert_eq!(anti.content, "AVOID: batch writes under load");
        assert_eq!(anti.kind, PatternKind::AntiPattern);
        assert!(anti.is_negative);
        assert_eq!(anti.reason.unwrap(), "7/10 (70%)");
    }

    #[test]
    fn invert_strips_pre_existing_directive_prefix() {
        let mut p = Pattern::new("AVOID: untested migrations", Vec::new());
        for _ in 0..7 {
            p.record_observation(ObservationKind::Harmful);
        }
        for _ in 0..3 {
            p.record_observation(ObservationKind::Helpful);
        }
        let anti = p.invert().unwrap();
        assert_eq!(anti.content, "AVOID: untested migrations");
    }

    #[test]
    fn example_cells_is_a_bounded_fifo() {
        let mut p = pattern();
        for i in 0..15 {
            p.add_example_cell(format!("cell-{i}"));
        }
        assert_eq!(p.example_cells.len(), MAX_EXAMPLE_CELLS);
        assert_eq!(p.example_cells.front().unwrap(), "cell-5");
    }

    #[test]
    fn render_proven_is_guidance_to_follow() {
        let mut p = pattern();
        for _ in 0..5 {
            p.record_observation(ObservationKind::Helpful);
        }
        assert_eq!(p.render(), Some("Follow: batch writes under load".to_string()));
    }

    #[test]
    fn render_anti_pattern_is_guidance_to_avoid() {
        let mut p = pattern();
        p.kind = PatternKind::AntiPattern;
        assert_eq!(p.render(), Some("AVOID: batch writes under load".to_string()));
    }

    #[test]
    fn render_candidate_renders_nothing() {
        assert_eq!(pattern().render(), None);
    }
}
