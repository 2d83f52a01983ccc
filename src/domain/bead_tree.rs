//! Decomposition plans: an epic spec fans out into subtask specs, forming a
//! bead tree represented as a flat array with integer-index dependency
//! edges (never cross-referenced objects), so acyclicity reduces to "every
//! dependency index is strictly less than its dependent's index".

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single file-path glob a subtask claims exclusive or shared access to.
pub type PathGlob = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpicSpec {
    pub id: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtaskSpec {
    pub id: String,
    pub epic_id: String,
    pub title: String,
    pub instructions: String,
    /// Indices into the owning [`BeadTree::subtasks`] array. `P2`: every
    /// entry must be strictly less than this subtask's own index.
    pub depends_on: Vec<usize>,
    pub exclusive_paths: Vec<PathGlob>,
    pub shared_paths: Vec<PathGlob>,
    /// `1..=5`, coarse sizing hint carried through to the materialized cell.
    pub estimated_complexity: u8,
}

/// A decomposition plan awaiting validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeadTree {
    pub epic: EpicSpec,
    pub subtasks: Vec<SubtaskSpec>,
}

/// Blocking violations. `P1`: no two subtasks may claim overlapping
/// exclusive paths. `P2`/`P3`: every dependency index must be in-bounds and
/// strictly less than its dependent's own index.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanValidationError {
    #[error("subtasks '{a}' and '{b}' both claim exclusive access to overlapping path '{path}'")]
    FileExclusivityViolation { a: String, b: String, path: String },

    #[error("subtask '{subtask}' dependency index {index} is out of bounds for this plan")]
    DependencyIndexOutOfBounds { subtask: String, index: usize },

    #[error("subtask '{subtask}' dependency index {index} is not strictly before its own index {subtask_index}")]
    DependencyNotEarlier { subtask: String, index: usize, subtask_index: usize },
}

/// A non-blocking heuristic warning (`O2`): two subtasks whose instructions
/// carry directives of opposite polarity that share enough vocabulary to
/// plausibly be about the same thing. Never authoritative; a planner should
/// surface this for human judgment, not block on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionConflict {
    pub a: String,
    pub b: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStats {
    pub subtask_count: usize,
    pub total_files: usize,
    pub total_complexity: u32,
}

/// The planner's plan-check result: a rejected plan carries an error plus
/// the full list of violations; an accepted plan carries size stats and any
/// non-blocking instruction-conflict warnings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanCheckOutcome {
    Invalid { error: String, details: Vec<PlanValidationError> },
    Valid { stats: PlanStats, warnings: Vec<InstructionConflict> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Polarity {
    Positive,
    Negative,
}

const POSITIVE_KEYWORDS: &[&str] = &["always", "must", "required", "ensure", "use", "prefer"];
const NEGATIVE_KEYWORDS: &[&str] = &["never", "don't", "dont", "avoid", "forbid", "no ", "not "];

impl BeadTree {
    /// Runs the blocking plan-validation rules and collects every violation
    /// found, rather than stopping at the first one.
    pub fn validate(&self) -> Vec<PlanValidationError> {
        let mut errors = Vec::new();
        errors.extend(self.check_file_exclusivity());
        errors.extend(self.check_dependency_indices());
        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Non-blocking heuristic warnings: the plan can be valid and still
    /// carry these.
    pub fn warnings(&self) -> Vec<InstructionConflict> {
        self.check_instruction_conflicts()
    }

    /// The planner's full `{valid,...}` result: validation errors short
    /// circuit with `Invalid`; otherwise `Valid` carries size stats and any
    /// instruction-conflict warnings.
    pub fn check_plan(&self) -> PlanCheckOutcome {
        let errors = self.validate();
        if !errors.is_empty() {
            return PlanCheckOutcome::Invalid { error: "plan failed validation".to_string(), details: errors };
        }

        let total_files = self.subtasks.iter().map(|s| s.exclusive_paths.len() + s.shared_paths.len()).sum();
        let total_complexity = self.subtasks.iter().map(|s| u32::from(s.estimated_complexity)).sum();
        PlanCheckOutcome::Valid {
            stats: PlanStats { subtask_count: self.subtasks.len(), total_files, total_complexity },
            warnings: self.warnings(),
        }
    }

    fn check_file_exclusivity(&self) -> Vec<PlanValidationError> {
        let mut errors = Vec::new();
        for i in 0..self.subtasks.len() {
            for j in (i + 1)..self.subtasks.len() {
                let a = &self.subtasks[i];
                let b = &self.subtasks[j];
                for path_a in &a.exclusive_paths {
                    for path_b in &b.exclusive_paths {
                        if globs_overlap(path_a, path_b) {
                            errors.push(PlanValidationError::FileExclusivityViolation {
                                a: a.id.clone(),
                                b: b.id.clone(),
                                path: path_a.clone(),
                            });
                        }
                    }
                }
            }
        }
        errors
    }

    /// `P2`/`P3`: every dependency index must be in-bounds and strictly
    /// earlier than the dependent subtask's own index. This alone rules out
    /// both self-dependency (`index == subtask_index`) and cycles (a cycle
    /// requires some edge pointing forward or to itself).
    fn check_dependency_indices(&self) -> Vec<PlanValidationError> {
        let mut errors = Vec::new();
        for (i, subtask) in self.subtasks.iter().enumerate() {
            for &dep in &subtask.depends_on {
                if dep >= self.subtasks.len() {
                    errors.push(PlanValidationError::DependencyIndexOutOfBounds { subtask: subtask.id.clone(), index: dep });
                } else if dep >= i {
                    errors.push(PlanValidationError::DependencyNotEarlier { subtask: subtask.id.clone(), index: dep, subtask_index: i });
                }
            }
        }
        errors
    }

    /// Heuristic only (`O2`): extracts directive sentences from each
    /// subtask's `title ∥ instructions`, classifies them positive/negative
    /// by keyword, and flags cross-subtask pairs of opposite polarity that
    /// share at least two significant (length > 3) tokens.
    fn check_instruction_conflicts(&self) -> Vec<InstructionConflict> {
        let directives: Vec<Vec<(Polarity, HashSet<String>)>> = self.subtasks.iter().map(|s| extract_directives(s)).collect();

        let mut conflicts = Vec::new();
        for i in 0..self.subtasks.len() {
            for j in (i + 1)..self.subtasks.len() {
                for (polarity_a, tokens_a) in &directives[i] {
                    for (polarity_b, tokens_b) in &directives[j] {
                        if polarity_a == polarity_b {
                            continue;
                        }
                        let shared: Vec<&String> = tokens_a.intersection(tokens_b).collect();
                        if shared.len() >= 2 {
                            let mut shared_sorted: Vec<String> = shared.into_iter().cloned().collect();
                            shared_sorted.sort();
                            conflicts.push(InstructionConflict {
                                a: self.subtasks[i].id.clone(),
                                b: self.subtasks[j].id.clone(),
                                detail: format!("opposite-polarity directives share tokens: {}", shared_sorted.join(", ")),
                            });
                        }
                    }
                }
            }
        }
        conflicts
    }

    /// Topological execution waves over the subtask dependency graph.
    pub fn execution_waves(&self) -> Vec<Vec<String>> {
        let n = self.subtasks.len();
        let mut completed = vec![false; n];
        let mut remaining: HashSet<usize> = (0..n).collect();
        let mut waves = Vec::new();

        while !remaining.is_empty() {
            let mut ready: Vec<usize> =
                remaining.iter().copied().filter(|&i| self.subtasks[i].depends_on.iter().all(|&d| completed[d])).collect();

            if ready.is_empty() {
                break; // cycle; plan validation should have already caught an index violation
            }
            ready.sort_unstable();

            for &i in &ready {
                remaining.remove(&i);
                completed[i] = true;
            }
            waves.push(ready.into_iter().map(|i| self.subtasks[i].id.clone()).collect());
        }

        waves
    }
}

fn extract_directives(subtask: &SubtaskSpec) -> Vec<(Polarity, HashSet<String>)> {
    let text = format!("{} {}", subtask.title, subtask.instructions);
    text.split(['.', '!', '?', '\n'])
        .filter_map(|sentence| {
            let polarity = classify_sentence(sentence)?;
            Some((polarity, significant_tokens(sentence)))
        })
        .collect()
}

fn classify_sentence(sentence: &str) -> Option<Polarity> {
    let lower = sentence.to_lowercase();
    let words: HashSet<&str> = lower.split(|c: char| !c.is_alphanumeric() && c != '\'').filter(|w| !w.is_empty()).collect();

    let has_negative = NEGATIVE_KEYWORDS.iter().any(|kw| if kw.contains(' ') { lower.contains(kw) } else { words.contains(kw) });
    if has_negative {
        return Some(Polarity::Negative);
    }
    let has_positive = POSITIVE_KEYWORDS.iter().any(|kw| words.contains(kw));
    if has_positive {
        return Some(Polarity::Positive);
    }
    None
}

fn significant_tokens(sentence: &str) -> HashSet<String> {
    sentence
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3)
        .map(str::to_string)
        .collect()
}

fn globs_overlap(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let a_prefix = a.trim_end_matches('*');
    let b_prefix = b.trim_end_matches('*');
    a_prefix.starts_with(b_prefix) || b_prefix.starts_with(a_prefix)
}
