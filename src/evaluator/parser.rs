// src/evaluator/parser.rs — Parse LLM evaluation replies into scores and feedback
//
// Accepted shapes:
//
// ```text
// {"score": 7, "rationale": "...", "whatIsWorkingWell": [...], ...}
// {"<criterion key>": {"score": 7, ...}}
// {"score": 7, "feedback": {"whatIsWorkingWell": [...], ...}}
// ```
//
// snake_case field names are accepted too, and scores may arrive as strings.

use serde_json::{Map, Value};

use super::EvaluationResponse;
use crate::core::types::{Criterion, FeedbackEntry};
use crate::infra::errors::RedraftError;
use crate::util::{extract_json_object, truncate_str};

pub fn parse_evaluation(content: &str, criterion: Criterion) -> Result<EvaluationResponse, RedraftError> {
    let json = extract_json_object(content).ok_or_else(|| {
        RedraftError::Parse(format!(
            "no JSON object in evaluator reply: {}",
            truncate_str(content, 120)
        ))
    })?;
    let value: Value =
        serde_json::from_str(json).map_err(|e| RedraftError::Parse(e.to_string()))?;
    let root = value
        .as_object()
        .ok_or_else(|| RedraftError::Parse("evaluator reply is not an object".into()))?;

    let body = locate_body(root, criterion)
        .ok_or_else(|| RedraftError::Parse("evaluator reply has no score".into()))?;
    let score = read_score(body)
        .ok_or_else(|| RedraftError::Parse("evaluator score is not a number".into()))?;

    let feedback_src = body
        .get("feedback")
        .and_then(Value::as_object)
        .unwrap_or(body);

    Ok(EvaluationResponse {
        score,
        rationale: read_string(body, &["rationale", "reasoning"]).unwrap_or_default(),
        feedback: FeedbackEntry {
            what_is_working_well: read_list(
                feedback_src,
                &["whatIsWorkingWell", "what_is_working_well"],
            ),
            what_needs_improvement: read_list(
                feedback_src,
                &["whatNeedsImprovement", "what_needs_improvement"],
            ),
            specific_suggestions: read_list(
                feedback_src,
                &["specificSuggestions", "specific_suggestions"],
            ),
        },
    })
}

/// Find the object holding `score`: the root, the entry under the
/// criterion key, or a lone nested object.
fn locate_body<'a>(root: &'a Map<String, Value>, criterion: Criterion) -> Option<&'a Map<String, Value>> {
    if root.contains_key("score") {
        return Some(root);
    }
    if let Some(obj) = root.get(criterion.key()).and_then(Value::as_object) {
        return Some(obj);
    }
    let mut nested = root
        .values()
        .filter_map(Value::as_object)
        .filter(|o| o.contains_key("score"));
    let first = nested.next()?;
    nested.next().is_none().then_some(first)
}

fn read_score(obj: &Map<String, Value>) -> Option<f32> {
    match obj.get("score")? {
        Value::Number(n) => n.as_f64().map(|f| f as f32),
        Value::String(s) => s.trim().trim_end_matches("/10").trim().parse().ok(),
        _ => None,
    }
}

fn read_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}

fn read_list(obj: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    let Some(value) = keys.iter().find_map(|k| obj.get(*k)) else {
        return Vec::new();
    };
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Value::String(s) => vec![s.clone()],
        _ => Vec::new(),
    }
}
