// src/generator/analysis.rs — Optional summary of a finished run
//
// Runs after the loop has terminated, never inside it. Failures become the
// analysis text instead of an error so a run is never lost to its summary.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::revision::format_score;
use crate::core::types::WorkflowState;
use crate::provider::{ChatRequest, Message, ModelProvider};
use crate::util::extract_json_object;

pub const MISSING_TEXT_ANALYSIS: &str = "Missing candidate text or original text for analysis.";

#[async_trait]
pub trait FinalAnalyzer: Send + Sync {
    /// Always yields text: either the analysis or a description of why
    /// there is none.
    async fn analyze(&self, state: &WorkflowState) -> String;
}

pub struct LlmAnalyzer {
    provider: Arc<dyn ModelProvider>,
    model: String,
}

impl LlmAnalyzer {
    pub fn new(provider: Arc<dyn ModelProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

pub(crate) fn build_prompt(state: &WorkflowState, candidate: &str) -> String {
    let scores = match &state.scores {
        Some(scores) => scores
            .iter()
            .map(|(c, &s)| format!("- {}: {}/10", c.label(), format_score(s)))
            .collect::<Vec<_>>()
            .join("\n"),
        None => "- not scored".to_string(),
    };
    format!(
        "Write a short analysis (one or two paragraphs) of how this rewrite turned out.\n\n\
         ## Original text\n{original}\n\n\
         ## Final rewrite\n{candidate}\n\n\
         ## Requested attributes\n{attributes}\n\n\
         ## Final scores\n{scores}\n\n\
         Revision passes: {iterations}\n\n\
         Comment on how the attributes were carried, what was kept from the original and \
         what could still be better. Reply with a JSON object: {{\"analysis\": \"...\"}}",
        original = state.original_text,
        attributes = state.requested_attributes.join(", "),
        iterations = state.iteration,
    )
}

/// Accept `{"analysis": ".."}` or fall back to the reply text itself.
pub(crate) fn parse_analysis(content: &str) -> String {
    extract_json_object(content)
        .and_then(|json| serde_json::from_str::<Value>(json).ok())
        .and_then(|v| v.get("analysis").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| content.trim().to_string())
}

#[async_trait]
impl FinalAnalyzer for LlmAnalyzer {
    async fn analyze(&self, state: &WorkflowState) -> String {
        let candidate = match state.candidate_text.as_deref() {
            Some(c) if !c.trim().is_empty() && !state.original_text.trim().is_empty() => c,
            _ => return MISSING_TEXT_ANALYSIS.to_string(),
        };

        let chat = ChatRequest::new(&self.model, vec![Message::user(build_prompt(state, candidate))])
            .with_sampling(0.4, 1500)
            .json();

        match self.provider.chat(chat).await {
            Ok(response) => parse_analysis(&response.content),
            Err(e) => {
                tracing::warn!("Final analysis failed: {}", e);
                format!("Error generating analysis: {e}")
            }
        }
    }
}
