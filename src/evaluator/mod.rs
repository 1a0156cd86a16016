// src/evaluator/mod.rs — Evaluator contract and the criterion table
//
// One evaluator per criterion. The table binding criteria to evaluators is
// built once at startup; the engine fans out over it every iteration.

pub mod judge;
pub mod parser;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::core::state::EvaluationOutcome;
use crate::core::types::*;
use crate::infra::errors::RedraftError;

/// Feedback lists longer than this are truncated.
pub const MAX_FEEDBACK_ITEMS: usize = 5;

/// Extra input some criteria need beyond the two texts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CriterionContext {
    None,
    RequestedAttributes(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub criterion: Criterion,
    pub original_text: String,
    pub candidate_text: String,
    pub context: CriterionContext,
}

/// What an evaluator reports for one criterion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResponse {
    pub score: f32,
    #[serde(default)]
    pub rationale: String,
    #[serde(flatten)]
    pub feedback: FeedbackEntry,
}

/// A single-criterion scorer.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, request: EvaluationRequest) -> Result<EvaluationResponse, RedraftError>;
}

#[derive(Clone)]
pub struct CriterionBinding {
    pub evaluator: Arc<dyn Evaluator>,
    /// Whether the evaluator receives the requested attributes.
    pub needs_attributes: bool,
}

/// Criterion → evaluator. Complete by construction.
#[derive(Clone)]
pub struct CriterionTable {
    bindings: CriterionMap<CriterionBinding>,
}

#[derive(Default)]
pub struct CriterionTableBuilder {
    bindings: BTreeMap<Criterion, CriterionBinding>,
}

impl CriterionTableBuilder {
    pub fn bind(mut self, criterion: Criterion, evaluator: Arc<dyn Evaluator>) -> Self {
        self.bindings.insert(
            criterion,
            CriterionBinding {
                evaluator,
                needs_attributes: criterion == Criterion::AttributeInclusion,
            },
        );
        self
    }

    pub fn build(self) -> Result<CriterionTable, RedraftError> {
        let bindings = CriterionMap::try_from(self.bindings)
            .map_err(|e| RedraftError::Config(format!("criterion table incomplete: {e}")))?;
        Ok(CriterionTable { bindings })
    }
}

impl CriterionTable {
    pub fn builder() -> CriterionTableBuilder {
        CriterionTableBuilder::default()
    }

    /// Bind every criterion through the same factory.
    pub fn uniform(mut factory: impl FnMut(Criterion) -> Arc<dyn Evaluator>) -> Self {
        Self {
            bindings: CriterionMap::from_fn(|criterion| CriterionBinding {
                evaluator: factory(criterion),
                needs_attributes: criterion == Criterion::AttributeInclusion,
            }),
        }
    }

    pub fn binding(&self, criterion: Criterion) -> &CriterionBinding {
        &self.bindings[criterion]
    }

    fn request_for(
        &self,
        criterion: Criterion,
        original_text: &str,
        candidate_text: &str,
        attributes: &[String],
    ) -> EvaluationRequest {
        let context = if self.bindings[criterion].needs_attributes {
            CriterionContext::RequestedAttributes(attributes.to_vec())
        } else {
            CriterionContext::None
        };
        EvaluationRequest {
            criterion,
            original_text: original_text.to_string(),
            candidate_text: candidate_text.to_string(),
            context,
        }
    }

    /// Run all four evaluators concurrently and wait for every one.
    ///
    /// Each evaluator runs on its own task under `timeout`. An error, a
    /// timeout or a panic in one evaluator becomes a zero score for that
    /// criterion and never affects the others.
    pub async fn evaluate_all(
        &self,
        original_text: &str,
        candidate_text: Option<&str>,
        attributes: &[String],
        timeout: Duration,
    ) -> CriterionMap<EvaluationOutcome> {
        let candidate = candidate_text.unwrap_or_default();
        if candidate.trim().is_empty() || original_text.trim().is_empty() {
            tracing::warn!("Missing text, skipping evaluator calls");
            return CriterionMap::from_fn(cannot_evaluate);
        }

        let handles: Vec<_> = Criterion::ALL
            .into_iter()
            .map(|criterion| {
                let evaluator = self.bindings[criterion].evaluator.clone();
                let request = self.request_for(criterion, original_text, candidate, attributes);
                tokio::spawn(async move {
                    match tokio::time::timeout(timeout, evaluator.evaluate(request)).await {
                        Ok(Ok(response)) => outcome_from_response(criterion, response),
                        Ok(Err(e)) => failed(criterion, &e.to_string()),
                        Err(_) => timed_out(criterion, timeout),
                    }
                })
            })
            .collect();

        let mut joined = join_all(handles).await.into_iter();
        CriterionMap::from_fn(|criterion| match joined.next() {
            Some(Ok(outcome)) => outcome,
            Some(Err(join_err)) => failed(criterion, &join_err.to_string()),
            None => failed(criterion, "evaluator result missing"),
        })
    }
}

// ─── Outcome helpers ────────────────────────────────────────────

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(MAX_FEEDBACK_ITEMS)
        .collect()
}

/// Clamp into `[0, MAX_SCORE]`; NaN becomes 0.
pub fn sanitize_score(score: f32) -> f32 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, MAX_SCORE)
    }
}

pub fn outcome_from_response(criterion: Criterion, response: EvaluationResponse) -> EvaluationOutcome {
    let score = sanitize_score(response.score);
    tracing::info!(criterion = %criterion, score, "Evaluation scored");
    EvaluationOutcome {
        criterion,
        score,
        rationale: response.rationale,
        feedback: FeedbackEntry {
            what_is_working_well: clean_list(response.feedback.what_is_working_well),
            what_needs_improvement: clean_list(response.feedback.what_needs_improvement),
            specific_suggestions: clean_list(response.feedback.specific_suggestions),
        },
        status: EvaluationStatus::Scored,
    }
}

/// Missing input: scored zero without calling the evaluator.
pub fn cannot_evaluate(criterion: Criterion) -> EvaluationOutcome {
    EvaluationOutcome {
        criterion,
        score: 0.0,
        rationale: String::new(),
        feedback: FeedbackEntry {
            what_is_working_well: vec![
                "Missing candidate text or original text for evaluation".into(),
            ],
            what_needs_improvement: vec!["Cannot evaluate without proper input text".into()],
            specific_suggestions: vec!["Ensure both original and candidate text are provided".into()],
        },
        status: EvaluationStatus::Skipped,
    }
}

pub fn failed(criterion: Criterion, message: &str) -> EvaluationOutcome {
    tracing::warn!(criterion = %criterion, "Evaluation failed: {}", message);
    failure_outcome(criterion, message, EvaluationStatus::Failed)
}

pub fn timed_out(criterion: Criterion, timeout: Duration) -> EvaluationOutcome {
    let err = RedraftError::Timeout {
        stage: format!("{} evaluation", criterion.label()),
        seconds: timeout.as_secs(),
    };
    tracing::warn!(criterion = %criterion, "{}", err);
    failure_outcome(criterion, &err.to_string(), EvaluationStatus::TimedOut)
}

fn failure_outcome(criterion: Criterion, message: &str, status: EvaluationStatus) -> EvaluationOutcome {
    EvaluationOutcome {
        criterion,
        score: 0.0,
        rationale: String::new(),
        feedback: FeedbackEntry {
            what_is_working_well: vec!["Error occurred during evaluation".into()],
            what_needs_improvement: vec!["Error occurred during evaluation".into()],
            specific_suggestions: vec![format!(
                "Error in {} evaluation: {}",
                criterion.label(),
                message
            )],
        },
        status,
    }
}
