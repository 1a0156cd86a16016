// src/evaluator/judge.rs — LLM judge for a single criterion

use std::sync::Arc;

use async_trait::async_trait;

use super::{CriterionContext, EvaluationRequest, EvaluationResponse, Evaluator};
use crate::core::types::Criterion;
use crate::infra::errors::RedraftError;
use crate::provider::{ChatRequest, Message, ModelProvider};

const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 2500;

/// Scores one criterion by asking a chat model to apply a rubric.
pub struct LlmEvaluator {
    provider: Arc<dyn ModelProvider>,
    model: String,
}

impl LlmEvaluator {
    pub fn new(provider: Arc<dyn ModelProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

fn rubric(criterion: Criterion, context: &CriterionContext) -> String {
    match criterion {
        Criterion::Intensity => "Rate how vividly and wholeheartedly the rewrite commits to the \
             requested tone and style. 0 means flat and indistinguishable from the original; \
             10 means every sentence carries the new voice with energy."
            .to_string(),
        Criterion::AttributeInclusion => {
            let attributes = match context {
                CriterionContext::RequestedAttributes(a) if !a.is_empty() => a.join(", "),
                _ => "(none were requested)".to_string(),
            };
            format!(
                "Rate how thoroughly and naturally the rewrite incorporates each of these \
                 requested attributes: {attributes}. 0 means none appear; 10 means every \
                 attribute is present and woven into the text rather than bolted on."
            )
        }
        Criterion::ContentPreservation => "Rate how much of the original subjects, events and \
             concepts survive in the rewrite. 0 means the rewrite is about something else; \
             10 means every key element is still recognizable."
            .to_string(),
        Criterion::StructurePreservation => "Rate how closely the rewrite follows the original \
             length, format and presentation (paragraphing, lists, dialogue layout, headings). \
             0 means the shape is unrecognizable; 10 means it mirrors the original."
            .to_string(),
    }
}

pub(crate) fn build_prompt(request: &EvaluationRequest) -> String {
    format!(
        "You are evaluating a text rewrite on a single criterion: {label}.\n\n\
         ## Rubric\n{rubric}\n\n\
         ## Original text\n{original}\n\n\
         ## Rewritten text\n{candidate}\n\n\
         Respond with a JSON object only, in this shape:\n\
         {{\"score\": <number 0-10>, \"rationale\": \"<one or two sentences>\", \
         \"whatIsWorkingWell\": [\"...\"], \"whatNeedsImprovement\": [\"...\"], \
         \"specificSuggestions\": [\"...\"]}}\n\
         Give at most five items per list. Suggestions must be concrete edits.",
        label = request.criterion.label(),
        rubric = rubric(request.criterion, &request.context),
        original = request.original_text,
        candidate = request.candidate_text,
    )
}

#[async_trait]
impl Evaluator for LlmEvaluator {
    async fn evaluate(&self, request: EvaluationRequest) -> Result<EvaluationResponse, RedraftError> {
        let chat = ChatRequest::new(&self.model, vec![Message::user(build_prompt(&request))])
            .with_system("You are a meticulous writing evaluator. You only output JSON.")
            .with_sampling(TEMPERATURE, MAX_TOKENS)
            .json();

        let response = self.provider.chat(chat).await?;
        tracing::debug!(
            criterion = %request.criterion,
            tokens = response.usage.total(),
            "Evaluator reply received"
        );
        super::parser::parse_evaluation(&response.content, request.criterion)
    }
}
