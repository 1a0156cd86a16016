// src/core/policy.rs — Continuation policy
//
// Pure function of (iteration, max_iterations, scores, min_scores). Evaluated
// once per consolidation.

use super::types::{MinScores, Scores, Termination};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    End(Termination),
}

impl Decision {
    pub fn should_continue(self) -> bool {
        self == Decision::Continue
    }
}

/// A score equal to its threshold passes.
pub fn passes(score: f32, threshold: f32) -> bool {
    score >= threshold
}

pub fn meets_all(scores: &Scores, min_scores: &MinScores) -> bool {
    scores
        .iter()
        .all(|(criterion, &score)| passes(score, min_scores[criterion]))
}

/// Decide whether to run another generation pass.
///
/// When the thresholds are met on the final allowed iteration both exits
/// apply; the run is reported as `ThresholdsMet`.
pub fn decide(
    iteration: u32,
    max_iterations: u32,
    scores: Option<&Scores>,
    min_scores: &MinScores,
) -> Decision {
    if scores.is_some_and(|s| meets_all(s, min_scores)) {
        return Decision::End(Termination::ThresholdsMet);
    }
    if iteration >= max_iterations {
        return Decision::End(Termination::MaxIterationsReached);
    }
    Decision::Continue
}
