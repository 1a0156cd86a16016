// src/core/types.rs — Core domain types

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MAX_ITERATIONS: u32 = 3;
pub const DEFAULT_MIN_SCORE: f32 = 7.0;
pub const MAX_SCORE: f32 = 10.0;

/// One independently scored quality dimension of a candidate.
///
/// The serialized form uses the wire keys shared with stored records and
/// the HTTP API, so renaming a variant never changes persisted data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Criterion {
    /// How strongly the rewrite carries the requested tone.
    #[serde(rename = "horniness")]
    Intensity,
    /// How well the requested attributes are woven in.
    #[serde(rename = "kinkInclusion")]
    AttributeInclusion,
    /// How much of the original subject matter survives.
    #[serde(rename = "contentPreservationScore")]
    ContentPreservation,
    /// How closely length, format and layout follow the original.
    #[serde(rename = "structurePreservationScore")]
    StructurePreservation,
}

impl Criterion {
    pub const COUNT: usize = 4;

    /// Every criterion, in table order. Fan-out, consolidation and
    /// tie-breaks all iterate in this order.
    pub const ALL: [Criterion; Criterion::COUNT] = [
        Criterion::Intensity,
        Criterion::AttributeInclusion,
        Criterion::ContentPreservation,
        Criterion::StructurePreservation,
    ];

    pub fn index(self) -> usize {
        match self {
            Criterion::Intensity => 0,
            Criterion::AttributeInclusion => 1,
            Criterion::ContentPreservation => 2,
            Criterion::StructurePreservation => 3,
        }
    }

    /// Wire key used in JSON and TOML.
    pub fn key(self) -> &'static str {
        match self {
            Criterion::Intensity => "horniness",
            Criterion::AttributeInclusion => "kinkInclusion",
            Criterion::ContentPreservation => "contentPreservationScore",
            Criterion::StructurePreservation => "structurePreservationScore",
        }
    }

    /// Human-readable label for logs and prompts.
    pub fn label(self) -> &'static str {
        match self {
            Criterion::Intensity => "Intensity",
            Criterion::AttributeInclusion => "Attribute inclusion",
            Criterion::ContentPreservation => "Content preservation",
            Criterion::StructurePreservation => "Structure preservation",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Criterion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Criterion::ALL
            .into_iter()
            .find(|c| c.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let keys: Vec<&str> = Criterion::ALL.iter().map(|c| c.key()).collect();
                format!("unknown criterion '{s}' (expected one of: {})", keys.join(", "))
            })
    }
}

/// A value for every criterion. Complete by construction: there is no way
/// to build one with a criterion missing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CriterionMap<T>([T; Criterion::COUNT]);

impl<T> CriterionMap<T> {
    pub fn from_fn(mut f: impl FnMut(Criterion) -> T) -> Self {
        Self(std::array::from_fn(|i| f(Criterion::ALL[i])))
    }

    pub fn get(&self, criterion: Criterion) -> &T {
        &self.0[criterion.index()]
    }

    pub fn set(&mut self, criterion: Criterion, value: T) {
        self.0[criterion.index()] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Criterion, &T)> {
        Criterion::ALL.into_iter().zip(self.0.iter())
    }

    pub fn map<U>(&self, mut f: impl FnMut(Criterion, &T) -> U) -> CriterionMap<U> {
        CriterionMap::from_fn(|c| f(c, self.get(c)))
    }
}

impl<T: Clone> CriterionMap<T> {
    pub fn splat(value: T) -> Self {
        Self::from_fn(|_| value.clone())
    }
}

impl<T: Default> Default for CriterionMap<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

impl<T> Index<Criterion> for CriterionMap<T> {
    type Output = T;

    fn index(&self, criterion: Criterion) -> &T {
        self.get(criterion)
    }
}

impl<T> IndexMut<Criterion> for CriterionMap<T> {
    fn index_mut(&mut self, criterion: Criterion) -> &mut T {
        &mut self.0[criterion.index()]
    }
}

impl<T> TryFrom<BTreeMap<Criterion, T>> for CriterionMap<T> {
    type Error = String;

    fn try_from(mut map: BTreeMap<Criterion, T>) -> Result<Self, Self::Error> {
        let mut values = Vec::with_capacity(Criterion::COUNT);
        let mut missing = Vec::new();
        for c in Criterion::ALL {
            match map.remove(&c) {
                Some(v) => values.push(v),
                None => missing.push(c.key()),
            }
        }
        if !missing.is_empty() {
            return Err(format!("missing criteria: {}", missing.join(", ")));
        }
        let values: [T; Criterion::COUNT] = values
            .try_into()
            .map_err(|_| "criterion table size mismatch".to_string())?;
        Ok(Self(values))
    }
}

impl<T: Serialize> Serialize for CriterionMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for CriterionMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = BTreeMap::<Criterion, T>::deserialize(deserializer)?;
        CriterionMap::try_from(map).map_err(D::Error::custom)
    }
}

/// Per-criterion scores on the 0–10 scale.
pub type Scores = CriterionMap<f32>;

/// Per-criterion thresholds; a score equal to its threshold passes.
pub type MinScores = CriterionMap<f32>;

pub fn default_min_scores() -> MinScores {
    CriterionMap::splat(DEFAULT_MIN_SCORE)
}

/// Evaluator feedback for a single criterion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEntry {
    #[serde(default)]
    pub what_is_working_well: Vec<String>,
    #[serde(default)]
    pub what_needs_improvement: Vec<String>,
    #[serde(default)]
    pub specific_suggestions: Vec<String>,
}

impl FeedbackEntry {
    pub fn is_empty(&self) -> bool {
        self.what_is_working_well.is_empty()
            && self.what_needs_improvement.is_empty()
            && self.specific_suggestions.is_empty()
    }
}

/// Feedback for all criteria; entries default to empty lists until their
/// evaluator has run.
pub type Feedback = CriterionMap<FeedbackEntry>;

/// One generation pass, amended with scores once consolidated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationSnapshot {
    pub iteration: u32,
    pub candidate_text: String,
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<Scores>,
}

impl IterationSnapshot {
    pub fn is_scored(&self) -> bool {
        self.scores.is_some()
    }
}

/// The single record threaded through one run. Mutated only through
/// `WorkflowState::apply` (see `core::state`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    pub session_id: String,
    pub request_id: String,
    pub original_text: String,
    pub requested_attributes: Vec<String>,
    pub attributes_inferred: bool,
    pub max_iterations: u32,
    pub min_scores: MinScores,
    pub candidate_text: Option<String>,
    pub rationale: Option<String>,
    pub scores: Option<Scores>,
    pub feedback: Feedback,
    pub iteration: u32,
    pub iteration_history: Vec<IterationSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_analysis: Option<String>,
    /// Why attribute inference fell back to an empty set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference_error: Option<String>,
}

/// Caller-supplied parameters for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInput {
    pub original_text: String,
    #[serde(default)]
    pub requested_attributes: Vec<String>,
    pub session_id: String,
    /// Caller-chosen request id; one is generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub max_iterations: Option<u32>,
    #[serde(default)]
    pub min_scores: Option<MinScores>,
    /// Run the final-analysis step after the loop ends.
    #[serde(default)]
    pub analyze: bool,
}

impl RunInput {
    pub fn new(original_text: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            original_text: original_text.into(),
            requested_attributes: Vec::new(),
            session_id: session_id.into(),
            request_id: None,
            max_iterations: None,
            min_scores: None,
            analyze: false,
        }
    }

    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requested_attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_min_scores(mut self, min_scores: MinScores) -> Self {
        self.min_scores = Some(min_scores);
        self
    }

    pub fn with_analysis(mut self, analyze: bool) -> Self {
        self.analyze = analyze;
        self
    }
}

/// Which stage ended a run abnormally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Generation,
}

/// Marker attached to a `FinalResult` when the run terminated abnormally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFailure {
    pub stage: FailureStage,
    /// Iteration number of the generation pass that failed.
    pub iteration: u32,
    pub message: String,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    ThresholdsMet,
    MaxIterationsReached,
    Failed,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::ThresholdsMet => write!(f, "thresholds met"),
            Termination::MaxIterationsReached => write!(f, "max iterations reached"),
            Termination::Failed => write!(f, "failed"),
        }
    }
}

/// What the caller gets back from `WorkflowEngine::run`, always including
/// the history accumulated up to the point the run stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalResult {
    pub request_id: String,
    pub session_id: String,
    pub original_text: String,
    pub candidate_text: Option<String>,
    pub rationale: Option<String>,
    pub scores: Option<Scores>,
    pub min_scores: MinScores,
    pub feedback: Feedback,
    pub iterations: u32,
    pub max_iterations: u32,
    pub iteration_history: Vec<IterationSnapshot>,
    pub attributes_used: Vec<String>,
    pub attributes_inferred: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference_error: Option<String>,
    pub termination: Termination,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_analysis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunFailure>,
}

impl FinalResult {
    pub fn from_state(state: WorkflowState, termination: Termination, error: Option<RunFailure>) -> Self {
        Self {
            request_id: state.request_id,
            session_id: state.session_id,
            original_text: state.original_text,
            candidate_text: state.candidate_text,
            rationale: state.rationale,
            scores: state.scores,
            min_scores: state.min_scores,
            feedback: state.feedback,
            iterations: state.iteration,
            max_iterations: state.max_iterations,
            iteration_history: state.iteration_history,
            attributes_used: state.requested_attributes,
            attributes_inferred: state.attributes_inferred,
            inference_error: state.inference_error,
            termination,
            final_analysis: state.final_analysis,
            error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// True when every criterion met its threshold on the last consolidation.
    pub fn all_thresholds_met(&self) -> bool {
        self.scores
            .as_ref()
            .is_some_and(|s| crate::core::policy::meets_all(s, &self.min_scores))
    }

    pub fn with_analysis(mut self, analysis: impl Into<String>) -> Self {
        self.final_analysis = Some(analysis.into());
        self
    }
}

/// Timeouts and defaults for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub default_max_iterations: u32,
    pub default_min_scores: MinScores,
    pub generation_timeout: Duration,
    pub evaluation_timeout: Duration,
    pub inference_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_max_iterations: DEFAULT_MAX_ITERATIONS,
            default_min_scores: default_min_scores(),
            generation_timeout: Duration::from_secs(120),
            evaluation_timeout: Duration::from_secs(60),
            inference_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&crate::infra::config::WorkflowConfig> for EngineConfig {
    fn from(cfg: &crate::infra::config::WorkflowConfig) -> Self {
        Self {
            default_max_iterations: cfg.max_iterations,
            default_min_scores: cfg.min_scores(),
            generation_timeout: cfg.generation_timeout(),
            evaluation_timeout: cfg.evaluation_timeout(),
            inference_timeout: cfg.inference_timeout(),
        }
    }
}

/// How a single evaluator call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Scored,
    Skipped,
    Failed,
    TimedOut,
}

impl fmt::Display for EvaluationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationStatus::Scored => write!(f, "scored"),
            EvaluationStatus::Skipped => write!(f, "skipped"),
            EvaluationStatus::Failed => write!(f, "failed"),
            EvaluationStatus::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Lifecycle events emitted by the engine for progress display.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    RunStarted {
        request_id: String,
        max_iterations: u32,
    },
    AttributesInferred {
        attributes: Vec<String>,
    },
    IterationStart {
        iteration: u32,
        max_iterations: u32,
    },
    Generated {
        iteration: u32,
        chars: usize,
    },
    CriterionEvaluated {
        criterion: Criterion,
        score: f32,
        status: EvaluationStatus,
    },
    Consolidated {
        iteration: u32,
        scores: Scores,
        min_scores: MinScores,
    },
    Complete {
        iterations: u32,
        termination: Termination,
    },
}
