// src/core/orchestrator.rs — Iteration controller
//
// START → INFER? → GENERATE → EVALUATE ×4 → CONSOLIDATE → {GENERATE | END}
//
// The engine owns the WorkflowState for the whole run. Stages return deltas;
// the engine applies them. Consolidation is the only join point, so the next
// generation never sees a partially merged set of scores.

use std::sync::Arc;

use super::policy::{self, Decision};
use super::state::StateDelta;
use super::types::*;
use crate::evaluator::CriterionTable;
use crate::generator::analysis::FinalAnalyzer;
use crate::generator::{AttributeInferrer, GenerationRequest, GenerationResponse, Generator, InferenceRequest};
use crate::infra::errors::RedraftError;

type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

pub struct WorkflowEngine {
    generator: Arc<dyn Generator>,
    evaluators: CriterionTable,
    inferrer: Option<Arc<dyn AttributeInferrer>>,
    analyzer: Option<Arc<dyn FinalAnalyzer>>,
    config: EngineConfig,
    on_progress: Option<ProgressCallback>,
}

impl WorkflowEngine {
    pub fn new(generator: Arc<dyn Generator>, evaluators: CriterionTable, config: EngineConfig) -> Self {
        Self {
            generator,
            evaluators,
            inferrer: None,
            analyzer: None,
            config,
            on_progress: None,
        }
    }

    pub fn with_inferrer(mut self, inferrer: Arc<dyn AttributeInferrer>) -> Self {
        self.inferrer = Some(inferrer);
        self
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn FinalAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Set a callback for lifecycle events.
    pub fn with_progress(mut self, cb: impl Fn(ProgressEvent) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(cb));
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(ref cb) = self.on_progress {
            cb(event);
        }
    }

    /// Reject bad input before any state exists. Returns the effective
    /// iteration cap and thresholds.
    fn validate(&self, input: &RunInput) -> Result<(u32, MinScores), RedraftError> {
        if input.original_text.trim().is_empty() {
            return Err(RedraftError::InvalidInput("original text must not be empty".into()));
        }
        if input.session_id.trim().is_empty() {
            return Err(RedraftError::InvalidInput("session id must not be empty".into()));
        }
        if input.request_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            return Err(RedraftError::InvalidInput("request id must not be blank".into()));
        }

        let max_iterations = input
            .max_iterations
            .unwrap_or(self.config.default_max_iterations);
        if max_iterations == 0 {
            return Err(RedraftError::InvalidInput("max iterations must be at least 1".into()));
        }

        let min_scores = input.min_scores.unwrap_or(self.config.default_min_scores);
        for (criterion, &threshold) in min_scores.iter() {
            if !(0.0..=MAX_SCORE).contains(&threshold) {
                return Err(RedraftError::InvalidInput(format!(
                    "threshold for {criterion} must be between 0 and {MAX_SCORE}, got {threshold}"
                )));
            }
        }

        Ok((max_iterations, min_scores))
    }

    /// Run the loop to completion.
    ///
    /// `Err` only for invalid input. Every run that starts returns a
    /// `FinalResult`, with `error` set when generation failed.
    pub async fn run(&self, input: RunInput) -> Result<FinalResult, RedraftError> {
        let (max_iterations, min_scores) = self.validate(&input)?;
        let analyze = input.analyze;
        let request_id = input
            .request_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut state = WorkflowState::new(input, request_id, max_iterations, min_scores);

        tracing::info!(
            request_id = %state.request_id,
            session_id = %state.session_id,
            max_iterations,
            attributes = state.requested_attributes.len(),
            "Workflow started"
        );
        self.emit(ProgressEvent::RunStarted {
            request_id: state.request_id.clone(),
            max_iterations,
        });

        if state.requested_attributes.is_empty() {
            if let Some(delta) = self.infer_attributes(&state.original_text).await {
                state.apply(delta);
                self.emit(ProgressEvent::AttributesInferred {
                    attributes: state.requested_attributes.clone(),
                });
            }
        }

        let (termination, failure) = loop {
            let iteration = state.iteration;
            self.emit(ProgressEvent::IterationStart {
                iteration: iteration + 1,
                max_iterations,
            });

            match self.generate(&state).await {
                Ok(delta) => state.apply(delta),
                Err(e) => {
                    tracing::error!(iteration, "Generation failed: {}", e);
                    break (
                        Termination::Failed,
                        Some(RunFailure {
                            stage: FailureStage::Generation,
                            iteration,
                            message: e.to_string(),
                        }),
                    );
                }
            }
            self.emit(ProgressEvent::Generated {
                iteration: state.iteration,
                chars: state.candidate_text.as_deref().map_or(0, |t| t.chars().count()),
            });

            let outcomes = self
                .evaluators
                .evaluate_all(
                    &state.original_text,
                    state.candidate_text.as_deref(),
                    &state.requested_attributes,
                    self.config.evaluation_timeout,
                )
                .await;
            for (criterion, outcome) in outcomes.iter() {
                self.emit(ProgressEvent::CriterionEvaluated {
                    criterion,
                    score: outcome.score,
                    status: outcome.status,
                });
            }

            state.apply(StateDelta::Consolidated { outcomes });
            tracing::info!(iteration = state.iteration, "Consolidated iteration");
            if let Some(scores) = state.scores {
                self.emit(ProgressEvent::Consolidated {
                    iteration: state.iteration,
                    scores,
                    min_scores: state.min_scores,
                });
            }

            match policy::decide(
                state.iteration,
                state.max_iterations,
                state.scores.as_ref(),
                &state.min_scores,
            ) {
                Decision::Continue => continue,
                Decision::End(termination) => break (termination, None),
            }
        };

        tracing::info!(
            request_id = %state.request_id,
            iterations = state.iteration,
            %termination,
            "Workflow finished"
        );

        if analyze {
            match &self.analyzer {
                Some(analyzer) => {
                    let analysis = analyzer.analyze(&state).await;
                    state.apply(StateDelta::Analyzed { analysis });
                }
                None => tracing::warn!("Analysis requested but no analyzer is configured"),
            }
        }

        self.emit(ProgressEvent::Complete {
            iterations: state.iteration,
            termination,
        });

        Ok(FinalResult::from_state(state, termination, failure))
    }

    /// At most once per run. Failure or timeout yields an empty set; the
    /// run carries on either way.
    async fn infer_attributes(&self, original_text: &str) -> Option<StateDelta> {
        let inferrer = self.inferrer.as_ref()?;
        let timeout = self.config.inference_timeout;
        let request = InferenceRequest {
            original_text: original_text.to_string(),
        };

        let (attributes, failure) = match tokio::time::timeout(timeout, inferrer.infer(request)).await {
            Ok(Ok(response)) => {
                tracing::info!(attributes = ?response.attributes, "Attributes inferred");
                (response.attributes, None)
            }
            Ok(Err(e)) => {
                tracing::warn!("Attribute inference failed: {}", e);
                (Vec::new(), Some(format!("attribute inference failed: {e}")))
            }
            Err(_) => {
                let message = format!("attribute inference timed out after {}s", timeout.as_secs());
                tracing::warn!("{}", message);
                (Vec::new(), Some(message))
            }
        };
        Some(StateDelta::AttributesInferred { attributes, failure })
    }

    async fn generate(&self, state: &WorkflowState) -> Result<StateDelta, RedraftError> {
        let request = GenerationRequest::from_state(state);
        let timeout = self.config.generation_timeout;

        let response = tokio::time::timeout(timeout, self.generator.generate(request))
            .await
            .map_err(|_| RedraftError::Timeout {
                stage: "generation".into(),
                seconds: timeout.as_secs(),
            })??;

        if let GenerationResponse::Raw { reason, .. } = &response {
            tracing::warn!(
                iteration = state.iteration,
                "Generator output not structured, keeping raw text: {}",
                reason.rationale()
            );
        }
        let (candidate_text, rationale) = response.into_parts();
        tracing::info!(iteration = state.iteration, chars = candidate_text.len(), "Generation complete");

        Ok(StateDelta::Generated {
            candidate_text,
            rationale,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{EvaluationRequest, EvaluationResponse, Evaluator};
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl Generator for Echo {
        async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, RedraftError> {
            Ok(GenerationResponse::Structured {
                candidate_text: request.original_text,
                rationale: "echo".into(),
            })
        }
    }

    struct Perfect;

    #[async_trait]
    impl Evaluator for Perfect {
        async fn evaluate(&self, _req: EvaluationRequest) -> Result<EvaluationResponse, RedraftError> {
            Ok(EvaluationResponse {
                score: 10.0,
                ..Default::default()
            })
        }
    }

    fn engine() -> WorkflowEngine {
        WorkflowEngine::new(
            Arc::new(Echo),
            CriterionTable::uniform(|_| Arc::new(Perfect)),
            EngineConfig::default(),
        )
    }

    // ─── Validation ─────────────────────────────────────────────

    #[tokio::test]
    async fn test_rejects_blank_text() {
        let err = engine().run(RunInput::new("   ", "s")).await.unwrap_err();
        assert!(matches!(err, RedraftError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_rejects_blank_session() {
        let err = engine().run(RunInput::new("text", "")).await.unwrap_err();
        assert!(err.to_string().contains("session id"));
    }

    #[tokio::test]
    async fn test_rejects_zero_iterations() {
        let err = engine()
            .run(RunInput::new("text", "s").with_max_iterations(0))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    #[tokio::test]
    async fn test_rejects_out_of_range_threshold() {
        let mut min = default_min_scores();
        min[Criterion::Intensity] = 11.0;
        let err = engine()
            .run(RunInput::new("text", "s").with_min_scores(min))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("horniness"));
    }

    // ─── Happy path ─────────────────────────────────────────────

    #[tokio::test]
    async fn test_perfect_scores_end_after_one_pass() {
        let result = engine()
            .run(RunInput::new("text", "s").with_attributes(["x"]))
            .await
            .unwrap();
        assert_eq!(result.iterations, 1);
        assert_eq!(result.termination, Termination::ThresholdsMet);
        assert!(result.is_success());
        assert!(result.all_thresholds_met());
        assert!(!result.attributes_inferred);
        assert!(uuid::Uuid::parse_str(&result.request_id).is_ok());
    }

    #[tokio::test]
    async fn test_caller_request_id_is_kept() {
        let result = engine()
            .run(RunInput::new("text", "s").with_attributes(["x"]).with_request_id("req-1"))
            .await
            .unwrap();
        assert_eq!(result.request_id, "req-1");
    }

    #[tokio::test]
    async fn test_no_inferrer_leaves_attributes_empty() {
        let result = engine().run(RunInput::new("text", "s")).await.unwrap();
        assert!(result.attributes_used.is_empty());
        assert!(!result.attributes_inferred);
    }

    #[tokio::test]
    async fn test_progress_events_bracket_run() {
        use std::sync::Mutex;
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let engine = engine().with_progress(move |e| {
            let tag = match e {
                ProgressEvent::RunStarted { .. } => "start",
                ProgressEvent::IterationStart { .. } => "iter",
                ProgressEvent::Generated { .. } => "gen",
                ProgressEvent::CriterionEvaluated { .. } => "eval",
                ProgressEvent::Consolidated { .. } => "cons",
                ProgressEvent::Complete { .. } => "done",
                ProgressEvent::AttributesInferred { .. } => "infer",
            };
            sink.lock().unwrap().push(tag);
        });
        engine
            .run(RunInput::new("text", "s").with_attributes(["x"]))
            .await
            .unwrap();
        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec!["start", "iter", "gen", "eval", "eval", "eval", "eval", "cons", "done"]
        );
    }
}
