// src/generator/parser.rs — Decompose generator and inference replies

use serde_json::Value;

use super::{GenerationResponse, RawReason};
use crate::core::state::normalize_attributes;
use crate::infra::errors::RedraftError;
use crate::util::extract_json_object;

/// Split a generator reply into candidate text and rationale. Never fails:
/// anything that is not the expected object comes back as `Raw`.
pub fn parse_generation(content: &str) -> GenerationResponse {
    let raw = |reason| GenerationResponse::Raw {
        text: content.trim().to_string(),
        reason,
    };

    let Some(json) = extract_json_object(content) else {
        return raw(RawReason::Unparseable);
    };
    let Ok(value) = serde_json::from_str::<Value>(json) else {
        return raw(RawReason::Unparseable);
    };

    let text = ["candidate_text", "candidateText", "rewritten_text", "rewrittenText"]
        .iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str));
    let rationale = value.get("rationale").and_then(Value::as_str);

    match (text, rationale) {
        (Some(text), Some(rationale)) if !text.trim().is_empty() => GenerationResponse::Structured {
            candidate_text: text.trim().to_string(),
            rationale: rationale.trim().to_string(),
        },
        _ => raw(RawReason::MissingFields),
    }
}

/// Pull attribute names out of an inference reply.
///
/// Accepts `{"suggested_attributes": [{"attribute": "x"}], "reasoning": ".."}`,
/// the same with plain strings, or a bare array.
pub fn parse_inference(content: &str) -> Result<(Vec<String>, Option<String>), RedraftError> {
    let trimmed = content.trim();
    let value: Value = if trimmed.starts_with('[') {
        serde_json::from_str::<Value>(trimmed)
    } else {
        let json = extract_json_object(trimmed)
            .ok_or_else(|| RedraftError::Parse("no JSON in inference reply".into()))?;
        serde_json::from_str::<Value>(json)
    }
    .map_err(|e| RedraftError::Parse(e.to_string()))?;

    let (items, reasoning) = match &value {
        Value::Array(items) => (items.as_slice(), None),
        Value::Object(obj) => {
            let items = ["suggested_attributes", "suggestedAttributes", "attributes"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_array))
                .ok_or_else(|| RedraftError::Parse("inference reply has no attribute list".into()))?;
            let reasoning = obj
                .get("reasoning")
                .and_then(Value::as_str)
                .map(str::to_string);
            (items.as_slice(), reasoning)
        }
        _ => return Err(RedraftError::Parse("unexpected inference reply".into())),
    };

    let attributes = items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Object(o) => ["attribute", "name"]
                .iter()
                .find_map(|k| o.get(*k).and_then(Value::as_str))
                .map(str::to_string),
            _ => None,
        })
        .collect();

    Ok((normalize_attributes(attributes), reasoning))
}
