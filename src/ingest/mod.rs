//! Ingest payload validation.
//!
//! Turns a loosely typed JSON body into a [`NewEvaluation`], rejecting
//! payloads with missing or uncoercible required fields. All errors
//! produced here are client errors.

use crate::error::{DashError, Result};
use crate::models::NewEvaluation;
use serde_json::{Map, Value};
use tracing::debug;

/// Validate an ingest body.
pub fn parse_payload(body: &Value) -> Result<NewEvaluation> {
    let obj = body
        .as_object()
        .ok_or_else(|| DashError::invalid_field("body", "expected a JSON object"))?;

    let evaluation = NewEvaluation {
        interaction_id: required_string(obj, "interaction_id")?,
        prompt: required_string(obj, "prompt")?,
        response: required_string(obj, "response")?,
        score: required_score(obj)?,
        latency_ms: required_latency(obj)?,
        flags: optional_flags(obj)?,
        pii_tokens_redacted: optional_count(obj, "pii_tokens_redacted")?,
    };

    debug!(
        "Validated ingest payload for interaction {}",
        evaluation.interaction_id
    );
    Ok(evaluation)
}

/// Look up a field, treating `null` the same as absence.
fn field<'a>(obj: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    obj.get(name).filter(|value| !value.is_null())
}

fn required_string(obj: &Map<String, Value>, name: &str) -> Result<String> {
    match field(obj, name) {
        None => Err(DashError::MissingField(name.to_string())),
        Some(Value::String(s)) if s.is_empty() => Err(DashError::MissingField(name.to_string())),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(DashError::invalid_field(name, "expected a string")),
    }
}

fn required_score(obj: &Map<String, Value>) -> Result<f64> {
    let score = match field(obj, "score") {
        None => return Err(DashError::MissingField("score".to_string())),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    match score {
        Some(score) if score.is_finite() => Ok(score),
        _ => Err(DashError::invalid_field("score", "expected a real number")),
    }
}

fn required_latency(obj: &Map<String, Value>) -> Result<u64> {
    // Zero is a legitimate latency; only absence counts as missing
    let value = field(obj, "latency_ms")
        .ok_or_else(|| DashError::MissingField("latency_ms".to_string()))?;
    coerce_count(value)
        .ok_or_else(|| DashError::invalid_field("latency_ms", "expected a non-negative integer"))
}

fn optional_count(obj: &Map<String, Value>, name: &str) -> Result<u64> {
    match field(obj, name) {
        None => Ok(0),
        Some(value) => coerce_count(value)
            .ok_or_else(|| DashError::invalid_field(name, "expected a non-negative integer")),
    }
}

fn coerce_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn optional_flags(obj: &Map<String, Value>) -> Result<Vec<String>> {
    match field(obj, "flags") {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(String::from).ok_or_else(|| {
                    DashError::invalid_field("flags", "expected an array of strings")
                })
            })
            .collect(),
        Some(_) => Err(DashError::invalid_field("flags", "expected an array of strings")),
    }
}
