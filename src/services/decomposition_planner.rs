//! Turns a natural-language task description into a strategy recommendation,
//! and validates a caller-supplied [`BeadTree`] before any cell is
//! materialized from it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::domain::bead_tree::{BeadTree, PlanCheckOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    FileBased,
    FeatureBased,
    RiskBased,
    ResearchBased,
}

impl Strategy {
    fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::FileBased => &["file", "module", "refactor", "path"],
            Self::FeatureBased => &["feature", "user story", "endpoint", "user-facing"],
            Self::RiskBased => &["security", "critical", "breaking", "migration"],
            Self::ResearchBased => &["investigate", "explore", "spike", "unknown"],
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::FileBased => "file-based",
            Self::FeatureBased => "feature-based",
            Self::RiskBased => "risk-based",
            Self::ResearchBased => "research-based",
        }
    }

    const ALL: [Self; 4] = [Self::FileBased, Self::FeatureBased, Self::RiskBased, Self::ResearchBased];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyAlternative {
    pub strategy: Strategy,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyRecommendation {
    pub winner: Strategy,
    pub confidence: f64,
    pub reasoning: Vec<String>,
    pub alternatives: Vec<StrategyAlternative>,
}

pub struct DecompositionPlanner;

impl Default for DecompositionPlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl DecompositionPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Scores every strategy by case-insensitive whole-word (or substring,
    /// for multi-word keywords) matches against `task_text`, and recommends
    /// the winner. Falls back to feature-based at 0.5 confidence if no
    /// keyword from any strategy matched.
    #[instrument(skip(self))]
    pub fn recommend_strategy(&self, task_text: &str) -> StrategyRecommendation {
        let lower = task_text.to_lowercase();
        let words: HashSet<&str> = lower.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).collect();

        let mut scored: Vec<(Strategy, u32, Vec<&'static str>)> = Strategy::ALL
            .iter()
            .map(|&strategy| {
                let matched: Vec<&'static str> = strategy
                    .keywords()
                    .iter()
                    .filter(|kw| if kw.contains(' ') { lower.contains(*kw) } else { words.contains(*kw) })
                    .copied()
                    .collect();
                (strategy, matched.len() as u32, matched)
            })
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        let total: u32 = scored.iter().map(|(_, score, _)| score).sum();
        if total == 0 {
            return StrategyRecommendation {
                winner: Strategy::FeatureBased,
                confidence: 0.5,
                reasoning: vec!["no strategy keywords matched; defaulting to feature-based".to_string()],
                alternatives: scored.into_iter().map(|(strategy, score, _)| StrategyAlternative { strategy, score }).collect(),
            };
        }

        let winner = scored[0].0;
        let winner_score = scored[0].1;
        let runner_up_score = scored.get(1).map(|(_, s, _)| *s).unwrap_or(0);
        let confidence = (0.5 + (winner_score as f64 - runner_up_score as f64) / total as f64).min(0.95);

        let reasoning = scored[0].2.iter().map(|kw| format!("matched keyword '{kw}'")).collect();
        let alternatives = scored.into_iter().map(|(strategy, score, _)| StrategyAlternative { strategy, score }).collect();

        StrategyRecommendation { winner, confidence, reasoning, alternatives }
    }

    pub fn check_plan(&self, tree: &BeadTree) -> PlanCheckOutcome {
        tree.check_plan()
    }
}
