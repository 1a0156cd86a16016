// tests/engine_test.rs — End-to-end tests for the workflow engine with mock adapters

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio::sync::Barrier;

use redraft::core::orchestrator::WorkflowEngine;
use redraft::core::types::*;
use redraft::evaluator::{CriterionContext, CriterionTable, EvaluationRequest, EvaluationResponse, Evaluator};
use redraft::generator::{
    AttributeInferrer, GenerationRequest, GenerationResponse, Generator, InferenceRequest,
    InferenceResponse, RawReason, PARSE_FAILURE_RATIONALE,
};
use redraft::infra::errors::RedraftError;

// ---------- Mock adapters ----------

/// Returns "draft N" and records every request it sees. Fails or stalls
/// on the listed call numbers (0-based).
#[derive(Default)]
struct RecordingGenerator {
    requests: Mutex<Vec<GenerationRequest>>,
    fail_on: Vec<usize>,
    stall_on: Vec<usize>,
    raw: bool,
}

impl RecordingGenerator {
    fn failing_on(calls: &[usize]) -> Self {
        Self {
            fail_on: calls.to_vec(),
            ..Default::default()
        }
    }

    fn stalling_on(calls: &[usize]) -> Self {
        Self {
            stall_on: calls.to_vec(),
            ..Default::default()
        }
    }

    fn raw() -> Self {
        Self {
            raw: true,
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, RedraftError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len() - 1
        };
        if self.stall_on.contains(&call) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if self.fail_on.contains(&call) {
            return Err(RedraftError::Adapter {
                adapter: "generator".into(),
                message: format!("boom on call {call}"),
            });
        }
        if self.raw {
            return Ok(GenerationResponse::Raw {
                text: format!("raw draft {call}"),
                reason: RawReason::Unparseable,
            });
        }
        Ok(GenerationResponse::Structured {
            candidate_text: format!("draft {call}"),
            rationale: format!("reason {call}"),
        })
    }
}

/// Scores follow a script indexed by call number; the last entry repeats.
struct ScriptedEvaluator {
    scores: Vec<f32>,
    calls: AtomicUsize,
    requests: Mutex<Vec<EvaluationRequest>>,
}

impl ScriptedEvaluator {
    fn new(scores: &[f32]) -> Arc<Self> {
        Arc::new(Self {
            scores: scores.to_vec(),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    async fn evaluate(&self, request: EvaluationRequest) -> Result<EvaluationResponse, RedraftError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let score = self.scores[call.min(self.scores.len() - 1)];
        let label = request.criterion.label();
        self.requests.lock().unwrap().push(request);
        Ok(EvaluationResponse {
            score,
            rationale: format!("{label} pass {call}"),
            feedback: FeedbackEntry {
                what_is_working_well: vec![format!("{label} ok")],
                what_needs_improvement: vec![format!("{label} weak")],
                specific_suggestions: vec![format!("{label} try {call}")],
            },
        })
    }
}

struct FailingEvaluator;

#[async_trait]
impl Evaluator for FailingEvaluator {
    async fn evaluate(&self, _req: EvaluationRequest) -> Result<EvaluationResponse, RedraftError> {
        Err(RedraftError::Parse("no score".into()))
    }
}

struct SlowEvaluator;

#[async_trait]
impl Evaluator for SlowEvaluator {
    async fn evaluate(&self, _req: EvaluationRequest) -> Result<EvaluationResponse, RedraftError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(EvaluationResponse {
            score: 10.0,
            ..Default::default()
        })
    }
}

/// Waits until all four evaluators are in flight at once.
struct BarrierEvaluator(Arc<Barrier>);

#[async_trait]
impl Evaluator for BarrierEvaluator {
    async fn evaluate(&self, _req: EvaluationRequest) -> Result<EvaluationResponse, RedraftError> {
        self.0.wait().await;
        Ok(EvaluationResponse {
            score: 9.0,
            ..Default::default()
        })
    }
}

struct FixedInferrer(Vec<&'static str>, AtomicUsize);

#[async_trait]
impl AttributeInferrer for FixedInferrer {
    async fn infer(&self, _req: InferenceRequest) -> Result<InferenceResponse, RedraftError> {
        self.1.fetch_add(1, Ordering::SeqCst);
        Ok(InferenceResponse {
            attributes: self.0.iter().map(|s| s.to_string()).collect(),
            reasoning: None,
        })
    }
}

struct FailingInferrer;

#[async_trait]
impl AttributeInferrer for FailingInferrer {
    async fn infer(&self, _req: InferenceRequest) -> Result<InferenceResponse, RedraftError> {
        Err(RedraftError::Provider {
            provider: "mock".into(),
            message: "unavailable".into(),
            retriable: false,
        })
    }
}

struct SlowInferrer;

#[async_trait]
impl AttributeInferrer for SlowInferrer {
    async fn infer(&self, _req: InferenceRequest) -> Result<InferenceResponse, RedraftError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(InferenceResponse {
            attributes: vec!["late".into()],
            reasoning: None,
        })
    }
}

// ---------- Helpers ----------

fn config() -> EngineConfig {
    EngineConfig {
        evaluation_timeout: Duration::from_millis(200),
        ..EngineConfig::default()
    }
}

fn short_timeouts() -> EngineConfig {
    EngineConfig {
        generation_timeout: Duration::from_millis(200),
        inference_timeout: Duration::from_millis(200),
        ..config()
    }
}

fn uniform(evaluator: Arc<dyn Evaluator>) -> CriterionTable {
    CriterionTable::uniform(|_| evaluator.clone())
}

fn engine(generator: Arc<RecordingGenerator>, evaluators: CriterionTable) -> WorkflowEngine {
    WorkflowEngine::new(generator, evaluators, config())
}

fn assert_history_invariants(result: &FinalResult) {
    assert!(result.iterations <= result.max_iterations);
    assert_eq!(result.iteration_history.len() as u32, result.iterations);
    for (i, snapshot) in result.iteration_history.iter().enumerate() {
        assert_eq!(snapshot.iteration, i as u32);
    }
}

// ---------- Scenarios ----------

#[tokio::test]
async fn test_single_iteration_scenario() {
    let generator = Arc::new(RecordingGenerator::default());
    let evaluator = ScriptedEvaluator::new(&[2.0]);
    let engine = engine(generator.clone(), uniform(evaluator.clone()));

    let result = engine
        .run(
            RunInput::new("The cat sat on the mat.", "session-1")
                .with_attributes(["whimsical"])
                .with_max_iterations(1),
        )
        .await
        .unwrap();

    assert_eq!(generator.calls(), 1);
    assert_eq!(evaluator.calls(), 4);
    assert_eq!(result.iterations, 1);
    assert_eq!(result.termination, Termination::MaxIterationsReached);
    assert_eq!(result.iteration_history.len(), 1);
    assert!(!result.attributes_inferred);
    assert_eq!(result.attributes_used, vec!["whimsical"]);
    assert_eq!(result.candidate_text.as_deref(), Some("draft 0"));
    assert!(result.is_success());
    assert!(!result.all_thresholds_met());

    let snapshot = &result.iteration_history[0];
    assert_eq!(snapshot.iteration, 0);
    assert_eq!(snapshot.scores, Some(Scores::splat(2.0)));
    assert!(snapshot.feedback.is_some());
    assert_history_invariants(&result);
}

#[tokio::test]
async fn test_stops_once_thresholds_met() {
    let generator = Arc::new(RecordingGenerator::default());
    let evaluator = ScriptedEvaluator::new(&[5.0, 5.0, 5.0, 5.0, 7.0]);
    let engine = engine(generator.clone(), uniform(evaluator.clone()));

    let result = engine
        .run(RunInput::new("text", "s").with_attributes(["a"]).with_max_iterations(5))
        .await
        .unwrap();

    assert_eq!(result.iterations, 2);
    assert_eq!(generator.calls(), 2);
    assert_eq!(result.termination, Termination::ThresholdsMet);
    assert!(result.all_thresholds_met());
    assert_history_invariants(&result);
}

#[tokio::test]
async fn test_runs_to_max_iterations_when_never_passing() {
    let generator = Arc::new(RecordingGenerator::default());
    let engine = engine(generator.clone(), uniform(ScriptedEvaluator::new(&[1.0])));

    let result = engine
        .run(RunInput::new("text", "s").with_attributes(["a"]).with_max_iterations(3))
        .await
        .unwrap();

    assert_eq!(result.iterations, 3);
    assert_eq!(generator.calls(), 3);
    assert_eq!(result.termination, Termination::MaxIterationsReached);
    assert_history_invariants(&result);
}

#[tokio::test]
async fn test_threshold_wins_when_both_exits_apply() {
    let generator = Arc::new(RecordingGenerator::default());
    let engine = engine(generator, uniform(ScriptedEvaluator::new(&[7.0])));

    let result = engine
        .run(RunInput::new("text", "s").with_attributes(["a"]).with_max_iterations(1))
        .await
        .unwrap();
    assert_eq!(result.termination, Termination::ThresholdsMet);
}

#[tokio::test]
async fn test_evaluators_run_concurrently() {
    let barrier = Arc::new(Barrier::new(Criterion::COUNT));
    let generator = Arc::new(RecordingGenerator::default());
    let engine = engine(generator, uniform(Arc::new(BarrierEvaluator(barrier))));

    let result = engine
        .run(RunInput::new("text", "s").with_attributes(["a"]).with_max_iterations(1))
        .await
        .unwrap();

    // Sequential calls would block at the barrier until the timeout.
    assert_eq!(result.scores, Some(Scores::splat(9.0)));
}

// ---------- Evaluator isolation ----------

#[tokio::test]
async fn test_failed_evaluator_does_not_affect_others() {
    let good = ScriptedEvaluator::new(&[8.0]);
    let table = CriterionTable::builder()
        .bind(Criterion::Intensity, good.clone())
        .bind(Criterion::AttributeInclusion, Arc::new(FailingEvaluator))
        .bind(Criterion::ContentPreservation, good.clone())
        .bind(Criterion::StructurePreservation, good.clone())
        .build()
        .unwrap();
    let engine = engine(Arc::new(RecordingGenerator::default()), table);

    let result = engine
        .run(RunInput::new("text", "s").with_attributes(["a"]).with_max_iterations(1))
        .await
        .unwrap();

    let scores = result.scores.unwrap();
    assert_eq!(scores[Criterion::AttributeInclusion], 0.0);
    assert_eq!(scores[Criterion::Intensity], 8.0);
    assert_eq!(scores[Criterion::StructurePreservation], 8.0);

    let feedback = &result.feedback[Criterion::AttributeInclusion];
    assert_eq!(feedback.what_is_working_well, vec!["Error occurred during evaluation"]);
    assert!(feedback.specific_suggestions[0].starts_with("Error in Attribute inclusion evaluation: "));
    assert!(result.is_success());
}

#[tokio::test]
async fn test_timed_out_evaluator_scores_zero() {
    let good = ScriptedEvaluator::new(&[9.0]);
    let table = CriterionTable::builder()
        .bind(Criterion::Intensity, good.clone())
        .bind(Criterion::AttributeInclusion, good.clone())
        .bind(Criterion::ContentPreservation, good.clone())
        .bind(Criterion::StructurePreservation, Arc::new(SlowEvaluator))
        .build()
        .unwrap();
    let engine = engine(Arc::new(RecordingGenerator::default()), table);

    let started = std::time::Instant::now();
    let result = engine
        .run(RunInput::new("text", "s").with_attributes(["a"]).with_max_iterations(1))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    let scores = result.scores.unwrap();
    assert_eq!(scores[Criterion::StructurePreservation], 0.0);
    assert_eq!(scores[Criterion::ContentPreservation], 9.0);
    assert!(result.feedback[Criterion::StructurePreservation].specific_suggestions[0].contains("timed out"));
}

#[tokio::test]
async fn test_only_attribute_criterion_gets_attributes() {
    let evaluator = ScriptedEvaluator::new(&[9.0]);
    let engine = engine(Arc::new(RecordingGenerator::default()), uniform(evaluator.clone()));

    engine
        .run(RunInput::new("text", "s").with_attributes(["noir", "rain"]).with_max_iterations(1))
        .await
        .unwrap();

    let requests = evaluator.requests.lock().unwrap();
    assert_eq!(requests.len(), 4);
    for request in requests.iter() {
        let expected = if request.criterion == Criterion::AttributeInclusion {
            CriterionContext::RequestedAttributes(vec!["noir".into(), "rain".into()])
        } else {
            CriterionContext::None
        };
        assert_eq!(request.context, expected);
        assert_eq!(request.candidate_text, "draft 0");
    }
}

#[tokio::test]
async fn test_missing_candidate_skips_evaluators() {
    struct Empty;

    #[async_trait]
    impl Generator for Empty {
        async fn generate(&self, _r: GenerationRequest) -> Result<GenerationResponse, RedraftError> {
            Ok(GenerationResponse::Structured {
                candidate_text: "   ".into(),
                rationale: "nothing".into(),
            })
        }
    }

    let evaluator = ScriptedEvaluator::new(&[10.0]);
    let engine = WorkflowEngine::new(Arc::new(Empty), uniform(evaluator.clone()), config());
    let result = engine
        .run(RunInput::new("text", "s").with_attributes(["a"]).with_max_iterations(1))
        .await
        .unwrap();

    assert_eq!(evaluator.calls(), 0);
    assert_eq!(result.scores, Some(Scores::splat(0.0)));
    for (_, entry) in result.feedback.iter() {
        assert_eq!(
            entry.what_is_working_well,
            vec!["Missing candidate text or original text for evaluation"]
        );
    }
}

// ---------- Generator failures ----------

#[tokio::test]
async fn test_first_generation_failure_is_fatal() {
    let generator = Arc::new(RecordingGenerator::failing_on(&[0]));
    let evaluator = ScriptedEvaluator::new(&[9.0]);
    let engine = engine(generator, uniform(evaluator.clone()));

    let result = engine
        .run(RunInput::new("text", "s").with_attributes(["a"]))
        .await
        .unwrap();

    assert_eq!(result.termination, Termination::Failed);
    assert_eq!(result.iterations, 0);
    assert!(result.iteration_history.is_empty());
    assert!(result.candidate_text.is_none());
    assert_eq!(evaluator.calls(), 0);

    let failure = result.error.as_ref().unwrap();
    assert_eq!(failure.stage, FailureStage::Generation);
    assert_eq!(failure.iteration, 0);
    assert!(failure.message.contains("boom on call 0"));
    assert_history_invariants(&result);
}

#[tokio::test]
async fn test_later_generation_failure_keeps_history() {
    let generator = Arc::new(RecordingGenerator::failing_on(&[1]));
    let engine = engine(generator, uniform(ScriptedEvaluator::new(&[3.0])));

    let result = engine
        .run(RunInput::new("text", "s").with_attributes(["a"]).with_max_iterations(3))
        .await
        .unwrap();

    assert_eq!(result.termination, Termination::Failed);
    assert_eq!(result.iterations, 1);
    assert_eq!(result.iteration_history.len(), 1);
    assert!(result.iteration_history[0].is_scored());
    assert_eq!(result.candidate_text.as_deref(), Some("draft 0"));
    assert_eq!(result.error.as_ref().unwrap().iteration, 1);
    assert_history_invariants(&result);
}

#[tokio::test]
async fn test_generation_timeout_is_fatal_and_keeps_history() {
    let generator = Arc::new(RecordingGenerator::stalling_on(&[1]));
    let engine = WorkflowEngine::new(
        generator.clone(),
        uniform(ScriptedEvaluator::new(&[3.0])),
        short_timeouts(),
    );

    let result = engine
        .run(RunInput::new("text", "s").with_attributes(["a"]).with_max_iterations(3))
        .await
        .unwrap();

    assert_eq!(generator.calls(), 2);
    assert_eq!(result.termination, Termination::Failed);
    assert_eq!(result.iterations, 1);
    assert_eq!(result.iteration_history.len(), 1);
    assert!(result.iteration_history[0].is_scored());
    assert_eq!(result.candidate_text.as_deref(), Some("draft 0"));

    let failure = result.error.as_ref().unwrap();
    assert_eq!(failure.stage, FailureStage::Generation);
    assert_eq!(failure.iteration, 1);
    assert!(failure.message.contains("timed out"));
    assert_history_invariants(&result);
}

#[tokio::test]
async fn test_raw_output_is_kept_as_candidate() {
    let generator = Arc::new(RecordingGenerator::raw());
    let engine = engine(generator, uniform(ScriptedEvaluator::new(&[9.0])));

    let result = engine
        .run(RunInput::new("text", "s").with_attributes(["a"]).with_max_iterations(1))
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.candidate_text.as_deref(), Some("raw draft 0"));
    assert_eq!(result.rationale.as_deref(), Some(PARSE_FAILURE_RATIONALE));
}

// ---------- Attribute inference ----------

#[tokio::test]
async fn test_inference_fills_empty_attributes_once() {
    let inferrer = Arc::new(FixedInferrer(vec!["cozy", " ", "cozy", "rain"], AtomicUsize::new(0)));
    let generator = Arc::new(RecordingGenerator::default());
    let engine = engine(generator.clone(), uniform(ScriptedEvaluator::new(&[1.0])))
        .with_inferrer(inferrer.clone());

    let result = engine
        .run(RunInput::new("text", "s").with_max_iterations(2))
        .await
        .unwrap();

    assert_eq!(inferrer.1.load(Ordering::SeqCst), 1);
    assert!(result.attributes_inferred);
    assert_eq!(result.attributes_used, vec!["cozy", "rain"]);
    for request in generator.requests.lock().unwrap().iter() {
        assert_eq!(request.requested_attributes, vec!["cozy", "rain"]);
    }
}

#[tokio::test]
async fn test_inference_skipped_when_attributes_given() {
    let inferrer = Arc::new(FixedInferrer(vec!["x"], AtomicUsize::new(0)));
    let engine = engine(
        Arc::new(RecordingGenerator::default()),
        uniform(ScriptedEvaluator::new(&[9.0])),
    )
    .with_inferrer(inferrer.clone());

    let result = engine
        .run(RunInput::new("text", "s").with_attributes(["given"]))
        .await
        .unwrap();

    assert_eq!(inferrer.1.load(Ordering::SeqCst), 0);
    assert!(!result.attributes_inferred);
    assert_eq!(result.attributes_used, vec!["given"]);
}

#[tokio::test]
async fn test_inference_failure_continues_with_empty_set() {
    let generator = Arc::new(RecordingGenerator::default());
    let engine = engine(generator.clone(), uniform(ScriptedEvaluator::new(&[9.0])))
        .with_inferrer(Arc::new(FailingInferrer));

    let result = engine.run(RunInput::new("text", "s")).await.unwrap();

    assert!(result.is_success());
    assert!(result.attributes_inferred);
    assert!(result.attributes_used.is_empty());
    assert_eq!(generator.calls(), 1);

    let reason = result.inference_error.as_deref().unwrap();
    assert!(reason.contains("unavailable"));
    let json = serde_json::to_value(&result).unwrap();
    assert!(json["inferenceError"].as_str().unwrap().contains("unavailable"));
}

#[tokio::test]
async fn test_inference_timeout_continues() {
    let generator = Arc::new(RecordingGenerator::default());
    let engine = WorkflowEngine::new(
        generator.clone(),
        uniform(ScriptedEvaluator::new(&[9.0])),
        short_timeouts(),
    )
    .with_inferrer(Arc::new(SlowInferrer));

    let result = engine.run(RunInput::new("text", "s")).await.unwrap();

    assert!(result.is_success());
    assert_eq!(result.termination, Termination::ThresholdsMet);
    assert!(result.attributes_inferred);
    assert!(result.attributes_used.is_empty());
    assert!(result.inference_error.as_deref().unwrap().contains("timed out"));
    assert_eq!(generator.calls(), 1);
    for request in generator.requests.lock().unwrap().iter() {
        assert!(request.requested_attributes.is_empty());
    }
}

#[tokio::test]
async fn test_successful_inference_has_no_error() {
    let engine = engine(
        Arc::new(RecordingGenerator::default()),
        uniform(ScriptedEvaluator::new(&[9.0])),
    )
    .with_inferrer(Arc::new(FixedInferrer(vec!["noir"], AtomicUsize::new(0))));

    let result = engine.run(RunInput::new("text", "s")).await.unwrap();

    assert!(result.inference_error.is_none());
    let json = serde_json::to_value(&result).unwrap();
    assert!(json.get("inferenceError").is_none());
}

// ---------- Revision context ----------

#[tokio::test]
async fn test_revision_context_only_after_first_pass() {
    let generator = Arc::new(RecordingGenerator::default());
    let low = ScriptedEvaluator::new(&[4.0]);
    let high = ScriptedEvaluator::new(&[8.0]);
    let table = CriterionTable::builder()
        .bind(Criterion::Intensity, high.clone())
        .bind(Criterion::AttributeInclusion, high.clone())
        .bind(Criterion::ContentPreservation, low.clone())
        .bind(Criterion::StructurePreservation, high.clone())
        .build()
        .unwrap();
    let engine = engine(generator.clone(), table);

    let result = engine
        .run(RunInput::new("text", "s").with_attributes(["a"]).with_max_iterations(2))
        .await
        .unwrap();
    assert_eq!(result.iterations, 2);

    let requests = generator.requests.lock().unwrap();
    assert!(!requests[0].is_revision());

    let revision = requests[1].revision.as_ref().unwrap();
    assert_eq!(revision.prior_candidate, "draft 0");
    assert_eq!(revision.prior_scores[Criterion::ContentPreservation], 4.0);
    assert_eq!(
        revision.emphasis.critical_criteria(),
        vec![Criterion::ContentPreservation]
    );
    assert_eq!(
        revision.feedback[Criterion::ContentPreservation].what_needs_improvement,
        vec!["Content preservation weak"]
    );
}

// ---------- Results ----------

#[tokio::test]
async fn test_final_result_round_trip() {
    let engine = engine(
        Arc::new(RecordingGenerator::default()),
        uniform(ScriptedEvaluator::new(&[4.0, 4.0, 4.0, 4.0, 6.5])),
    );
    let result = engine
        .run(RunInput::new("text", "s").with_attributes(["a"]).with_max_iterations(2))
        .await
        .unwrap();

    let json = serde_json::to_string(&result).unwrap();
    let back: FinalResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back, result);

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert!(value["scores"].get("kinkInclusion").is_some());
    assert_eq!(value["iterationHistory"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_engine_is_shareable_across_runs() {
    let engine = Arc::new(engine(
        Arc::new(RecordingGenerator::default()),
        uniform(ScriptedEvaluator::new(&[9.0])),
    ));

    let runs: Vec<_> = (0..3)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .run(RunInput::new(format!("text {i}"), format!("s{i}")).with_attributes(["a"]))
                    .await
            })
        })
        .collect();

    let mut ids = Vec::new();
    for run in runs {
        let result = run.await.unwrap().unwrap();
        assert_eq!(result.iterations, 1);
        ids.push(result.request_id);
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}
