// src/provider/openai_compat.rs — Generic OpenAI-compatible chat provider
//
// Talks to any `/chat/completions` endpoint (Venice, OpenRouter, Groq,
// a local llama.cpp server, ...).

use async_trait::async_trait;
use std::time::Duration;

use super::{ChatRequest, ChatResponse, ModelProvider, Role, StopReason, TokenUsage};
use crate::infra::errors::RedraftError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

pub struct OpenAICompatProvider {
    id_str: String,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAICompatProvider {
    pub fn new(id: impl Into<String>, api_key: String, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            id_str: id.into(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn provider_error(&self, message: impl Into<String>, retriable: bool) -> RedraftError {
        RedraftError::Provider {
            provider: self.id_str.clone(),
            message: message.into(),
            retriable,
        }
    }
}

/// Build the JSON body for a chat completion call.
pub(crate) fn build_body(request: &ChatRequest) -> serde_json::Value {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(system) = &request.system {
        messages.push(serde_json::json!({"role": "system", "content": system}));
    }
    for m in &request.messages {
        messages.push(serde_json::json!({
            "role": match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            "content": m.content,
        }));
    }

    let mut body = serde_json::json!({
        "model": request.model,
        "messages": messages,
    });
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }
    if let Some(temp) = request.temperature {
        body["temperature"] = serde_json::json!(temp);
    }
    if request.json_mode {
        body["response_format"] = serde_json::json!({"type": "json_object"});
    }
    body
}

/// Pull content, usage and finish reason out of a completion response.
pub(crate) fn parse_completion(resp: &serde_json::Value) -> ChatResponse {
    let choice = &resp["choices"][0];
    let content = choice["message"]["content"]
        .as_str()
        .unwrap_or("")
        .to_string();

    let stop_reason = match choice["finish_reason"].as_str() {
        Some("stop") => StopReason::EndTurn,
        Some("length") => StopReason::MaxTokens,
        Some("stop_sequence") => StopReason::StopSequence,
        _ => StopReason::Unknown,
    };

    let usage = TokenUsage {
        input_tokens: resp["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: resp["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    };

    ChatResponse {
        content,
        usage,
        stop_reason,
    }
}

#[async_trait]
impl ModelProvider for OpenAICompatProvider {
    fn id(&self) -> &str {
        &self.id_str
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, RedraftError> {
        let body = build_body(&request);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("User-Agent", format!("redraft/{}", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.provider_error(e.to_string(), e.is_timeout() || e.is_connect()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(1000);
            return Err(RedraftError::RateLimited {
                provider: self.id_str.clone(),
                retry_after_ms,
            });
        }
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(self.provider_error(
                format!("HTTP {status}: {error_body}"),
                status.is_server_error(),
            ));
        }

        let resp: serde_json::Value = response
            .json()
            .await
            .map_err(|e| self.provider_error(e.to_string(), false))?;

        let parsed = parse_completion(&resp);
        tracing::debug!(
            provider = %self.id_str,
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            "chat completion"
        );
        Ok(parsed)
    }
}
