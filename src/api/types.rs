// src/api/types.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::types::{Criterion, FinalResult, RunFailure, Scores, Termination};
use crate::memory::store::FeedbackRow;

/// Original text that short-circuits the engine with a canned result.
pub const PREBAKED_TEST_QUERY: &str = "prebaked-test-query";

/// Request body for `POST /api/v1/rewrite`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteRequest {
    pub original_text: String,
    #[serde(default)]
    pub attributes: Vec<String>,
    pub session_id: String,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub max_iterations: Option<u32>,
    /// Partial maps are allowed; missing criteria keep the server default.
    #[serde(default)]
    pub min_scores: Option<BTreeMap<Criterion, f32>>,
    #[serde(default)]
    pub analyze: bool,
    #[serde(default)]
    pub allow_external_grading: bool,
}

impl RewriteRequest {
    /// Field-level problems, formatted as `field: message`.
    pub fn validate(&self) -> Vec<String> {
        let mut details = Vec::new();
        if self.original_text.trim().is_empty() {
            details.push("originalText: Original text is required".to_string());
        }
        if uuid::Uuid::parse_str(&self.session_id).is_err() {
            details.push("sessionId: Session ID must be a valid UUID".to_string());
        }
        if let Some(ref id) = self.request_id {
            if uuid::Uuid::parse_str(id).is_err() {
                details.push("requestId: Request ID must be a valid UUID".to_string());
            }
        }
        if self.max_iterations == Some(0) {
            details.push("maxIterations: must be at least 1".to_string());
        }
        for (criterion, value) in self.min_scores.iter().flatten() {
            if !(0.0..=10.0).contains(value) {
                details.push(format!("minScores.{criterion}: must be between 0 and 10"));
            }
        }
        details
    }
}

/// The slice of a `FinalResult` returned to HTTP callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteResult {
    pub request_id: String,
    pub candidate_text: String,
    pub rationale: String,
    pub final_analysis: String,
    pub attributes: Vec<String>,
    pub attributes_inferred: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference_error: Option<String>,
    pub scores: Option<Scores>,
    pub iterations: u32,
    pub termination: Termination,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunFailure>,
}

impl From<FinalResult> for RewriteResult {
    fn from(result: FinalResult) -> Self {
        Self {
            request_id: result.request_id,
            candidate_text: result.candidate_text.unwrap_or_default(),
            rationale: result.rationale.unwrap_or_default(),
            final_analysis: result.final_analysis.unwrap_or_default(),
            attributes: result.attributes_used,
            attributes_inferred: result.attributes_inferred,
            inference_error: result.inference_error,
            scores: result.scores,
            iterations: result.iterations,
            termination: result.termination,
            error: result.error,
        }
    }
}

impl RewriteResult {
    /// Canned result for smoke-testing a deployment without model calls.
    pub fn prebaked(request_id: String) -> Self {
        let mut scores = Scores::splat(1.0);
        scores[Criterion::Intensity] = 0.1;
        scores[Criterion::AttributeInclusion] = 0.1;
        Self {
            request_id,
            candidate_text: format!(
                "This is a pre-baked response for '{PREBAKED_TEST_QUERY}', used as a test \
                 query to confirm parts of the REST API are working."
            ),
            rationale: String::new(),
            final_analysis: "This is a pre-baked final analysis for the test query.".into(),
            attributes: vec!["testing".into()],
            attributes_inferred: false,
            inference_error: None,
            scores: Some(scores),
            iterations: 1,
            termination: Termination::MaxIterationsReached,
            error: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RewriteResponse {
    pub success: bool,
    pub result: RewriteResult,
}

/// Request body for `POST /api/v1/feedback`. With `feedbackId` set the
/// existing entry is updated, otherwise a new one is created.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub request_id: String,
    #[serde(default)]
    pub feedback_id: Option<String>,
    pub is_positive: bool,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackData {
    pub id: String,
    pub request_id: String,
    pub is_positive: bool,
    pub feedback: String,
    pub created_at: String,
}

impl From<FeedbackRow> for FeedbackData {
    fn from(row: FeedbackRow) -> Self {
        Self {
            id: row.id,
            request_id: row.request_id,
            is_positive: row.is_thumbs_up,
            feedback: row.feedback_text.unwrap_or_default(),
            created_at: row.created_at,
        }
    }
}

/// Success envelope for non-rewrite endpoints.
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data }
    }
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = Some(details);
        self
    }
}
