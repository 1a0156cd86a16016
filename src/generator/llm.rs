// src/generator/llm.rs — LLM-backed generator and attribute inferrer

use std::sync::Arc;

use async_trait::async_trait;

use super::parser::{parse_generation, parse_inference};
use super::{
    AttributeInferrer, GenerationRequest, GenerationResponse, Generator, InferenceRequest,
    InferenceResponse,
};
use crate::core::revision::{format_score, render_revision_instructions};
use crate::infra::errors::RedraftError;
use crate::provider::{ChatRequest, Message, ModelProvider};
use crate::util::truncate_str;

const SYSTEM_PROMPT: &str = "You are a skilled creative rewriter. You transform a source text \
     into a new version that carries the requested stylistic attributes while keeping the \
     original subjects and the original shape of the text. You always reply with a JSON object.";

pub struct LlmGenerator {
    provider: Arc<dyn ModelProvider>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmGenerator {
    pub fn new(provider: Arc<dyn ModelProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.5,
            max_tokens: 1000,
        }
    }
}

pub(crate) fn build_prompt(request: &GenerationRequest) -> String {
    let attributes = if request.requested_attributes.is_empty() {
        "(none specified; choose a fitting style yourself)".to_string()
    } else {
        request.requested_attributes.join(", ")
    };
    let thresholds: Vec<String> = request
        .min_scores
        .iter()
        .map(|(c, &t)| format!("{} >= {}", c.label(), format_score(t)))
        .collect();

    let mut prompt = format!(
        "Rewrite the following text.\n\n\
         ## Original text\n{original}\n\n\
         ## Requested attributes\n{attributes}\n\n\
         ## Targets\nThe rewrite is scored 0-10 on each criterion and must reach: {targets}.\n\
         Keep the original subjects and concepts. Keep the original length, format and \
         presentation style.\n\n",
        original = request.original_text,
        targets = thresholds.join(", "),
    );

    if let Some(revision) = &request.revision {
        prompt.push_str(&render_revision_instructions(
            revision,
            &request.min_scores,
            &request.requested_attributes,
        ));
        prompt.push_str("\n\n");
    }

    prompt.push_str(
        "Reply with a JSON object only:\n\
         {\"candidate_text\": \"<the full rewritten text>\", \
         \"rationale\": \"<a short explanation of the choices you made>\"}",
    );
    prompt
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, RedraftError> {
        let chat = ChatRequest::new(&self.model, vec![Message::user(build_prompt(&request))])
            .with_system(SYSTEM_PROMPT)
            .with_sampling(self.temperature, self.max_tokens)
            .json();

        let response = self.provider.chat(chat).await?;
        tracing::debug!(
            revision = request.is_revision(),
            preview = truncate_str(&response.content, 200),
            "Generator reply received"
        );
        Ok(parse_generation(&response.content))
    }
}

pub struct LlmAttributeInferrer {
    provider: Arc<dyn ModelProvider>,
    model: String,
}

impl LlmAttributeInferrer {
    pub fn new(provider: Arc<dyn ModelProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

fn inference_prompt(original_text: &str) -> String {
    format!(
        "Read the text below and suggest two to four stylistic attributes (tone, genre, mood \
         or voice) that would make an interesting rewrite of it.\n\n\
         ## Text\n{original_text}\n\n\
         Reply with a JSON object only:\n\
         {{\"suggested_attributes\": [{{\"attribute\": \"...\"}}], \"reasoning\": \"...\"}}"
    )
}

#[async_trait]
impl AttributeInferrer for LlmAttributeInferrer {
    async fn infer(&self, request: InferenceRequest) -> Result<InferenceResponse, RedraftError> {
        if request.original_text.trim().is_empty() {
            return Ok(InferenceResponse::default());
        }

        let chat = ChatRequest::new(
            &self.model,
            vec![Message::user(inference_prompt(&request.original_text))],
        )
        .with_sampling(0.6, 500)
        .json();

        let response = self.provider.chat(chat).await?;
        let (attributes, reasoning) = parse_inference(&response.content)?;
        Ok(InferenceResponse {
            attributes,
            reasoning,
        })
    }
}
