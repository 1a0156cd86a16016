// src/core/state.rs — Workflow state deltas and the reducer that applies them
//
// Each stage returns a delta; only the engine applies deltas to the state it
// owns. Nothing else mutates a WorkflowState.

use super::types::*;

/// Result of one evaluator call, already reduced to a safe value.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationOutcome {
    pub criterion: Criterion,
    pub score: f32,
    pub rationale: String,
    pub feedback: FeedbackEntry,
    pub status: EvaluationStatus,
}

/// A partial update produced by a stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StateDelta {
    /// Attribute inference finished. On failure `attributes` is empty and
    /// `failure` carries the reason.
    AttributesInferred {
        attributes: Vec<String>,
        failure: Option<String>,
    },
    /// A generation pass returned a candidate.
    Generated {
        candidate_text: String,
        rationale: String,
    },
    /// All four evaluations for the current iteration have joined.
    Consolidated {
        outcomes: CriterionMap<EvaluationOutcome>,
    },
    /// Downstream analysis text.
    Analyzed { analysis: String },
}

impl WorkflowState {
    /// Build the initial state. `input` must already be validated.
    pub fn new(input: RunInput, request_id: String, max_iterations: u32, min_scores: MinScores) -> Self {
        Self {
            session_id: input.session_id,
            request_id,
            original_text: input.original_text,
            requested_attributes: normalize_attributes(input.requested_attributes),
            attributes_inferred: false,
            max_iterations,
            min_scores,
            candidate_text: None,
            rationale: None,
            scores: None,
            feedback: Feedback::default(),
            iteration: 0,
            iteration_history: Vec::new(),
            final_analysis: None,
            inference_error: None,
        }
    }

    /// Merge a delta into the state.
    pub fn apply(&mut self, delta: StateDelta) {
        match delta {
            StateDelta::AttributesInferred { attributes, failure } => {
                self.requested_attributes = normalize_attributes(attributes);
                self.attributes_inferred = true;
                self.inference_error = failure;
            }
            StateDelta::Generated {
                candidate_text,
                rationale,
            } => {
                debug_assert!(
                    self.iteration < self.max_iterations,
                    "generation past max_iterations"
                );
                self.iteration_history.push(IterationSnapshot {
                    iteration: self.iteration,
                    candidate_text: candidate_text.clone(),
                    rationale: rationale.clone(),
                    feedback: None,
                    scores: None,
                });
                self.candidate_text = Some(candidate_text);
                self.rationale = Some(rationale);
                self.iteration += 1;
            }
            StateDelta::Consolidated { outcomes } => {
                let scores = outcomes.map(|_, o| o.score);
                for (criterion, outcome) in outcomes.iter() {
                    self.feedback[criterion] = outcome.feedback.clone();
                }
                self.scores = Some(scores);

                // Back-fill the snapshot of the iteration just evaluated.
                let completed = self.iteration.checked_sub(1);
                if let Some(last) = self
                    .iteration_history
                    .last_mut()
                    .filter(|s| Some(s.iteration) == completed)
                {
                    last.scores = Some(scores);
                    last.feedback = Some(self.feedback.clone());
                }
            }
            StateDelta::Analyzed { analysis } => {
                self.final_analysis = Some(analysis);
            }
        }
    }

    /// The snapshot of the most recent generation pass, if any.
    pub fn latest_snapshot(&self) -> Option<&IterationSnapshot> {
        self.iteration_history.last()
    }
}

/// Trim, drop blanks and de-duplicate while keeping first-seen order.
pub fn normalize_attributes(attributes: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(attributes.len());
    for attr in attributes {
        let trimmed = attr.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !seen.iter().any(|s| s.eq_ignore_ascii_case(trimmed)) {
            seen.push(trimmed.to_string());
        }
    }
    seen
}
