// src/generator/mod.rs — Generation and attribute inference contracts

pub mod analysis;
pub mod llm;
pub mod parser;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::revision::RevisionContext;
use crate::core::types::{MinScores, WorkflowState};
use crate::infra::errors::RedraftError;

/// Rationale recorded when the reply was JSON but lacked a required field.
pub const UNSTRUCTURED_RATIONALE: &str = "Response was not in the expected structured format.";
/// Rationale recorded when the reply could not be parsed at all.
pub const PARSE_FAILURE_RATIONALE: &str =
    "Failed to parse structured response - using raw response as text";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub original_text: String,
    pub requested_attributes: Vec<String>,
    pub min_scores: MinScores,
    /// Present only after the first generation pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<RevisionContext>,
}

impl GenerationRequest {
    pub fn from_state(state: &WorkflowState) -> Self {
        Self {
            original_text: state.original_text.clone(),
            requested_attributes: state.requested_attributes.clone(),
            min_scores: state.min_scores,
            revision: RevisionContext::from_state(state),
        }
    }

    pub fn is_revision(&self) -> bool {
        self.revision.is_some()
    }
}

/// What a generator hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResponse {
    Structured {
        candidate_text: String,
        rationale: String,
    },
    /// Output that could not be split into text and rationale. The engine
    /// keeps the raw text as the candidate.
    Raw { text: String, reason: RawReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawReason {
    /// Valid JSON, wrong shape.
    MissingFields,
    /// Not JSON at all.
    Unparseable,
}

impl RawReason {
    pub fn rationale(self) -> &'static str {
        match self {
            RawReason::MissingFields => UNSTRUCTURED_RATIONALE,
            RawReason::Unparseable => PARSE_FAILURE_RATIONALE,
        }
    }
}

impl GenerationResponse {
    /// Split into `(candidate_text, rationale)`, substituting the sentinel
    /// rationale for raw output.
    pub fn into_parts(self) -> (String, String) {
        match self {
            GenerationResponse::Structured {
                candidate_text,
                rationale,
            } => (candidate_text, rationale),
            GenerationResponse::Raw { text, reason } => (text, reason.rationale().to_string()),
        }
    }
}

/// Produces a candidate rewrite. An `Err` is fatal for the run.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, RedraftError>;
}

#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub original_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InferenceResponse {
    pub attributes: Vec<String>,
    pub reasoning: Option<String>,
}

/// Proposes attributes when the caller supplied none. Failures are
/// absorbed by the engine.
#[async_trait]
pub trait AttributeInferrer: Send + Sync {
    async fn infer(&self, request: InferenceRequest) -> Result<InferenceResponse, RedraftError>;
}
