//! Pulling a JSON object out of free-form model text.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::error::{LLMError, Result};

lazy_static! {
    static ref FENCED_BLOCK: Regex =
        Regex::new(r"```(?:json|JSON)?\s*([\s\S]*?)\s*```").expect("valid fenced block pattern");
}

/// Try, in order: a fenced code block, the whole trimmed body, and the span
/// between the first opening and last closing brace.
pub fn extract_json(text: &str) -> Result<Value> {
    if let Some(caps) = FENCED_BLOCK.captures(text) {
        if let Some(block) = caps.get(1) {
            if let Ok(value) = serde_json::from_str::<Value>(block.as_str()) {
                return Ok(value);
            }
        }
    }

    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    if let Some(inner) = strip_noise(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(inner) {
            return Ok(value);
        }
    }

    Err(LLMError::malformed("no JSON object found", text))
}

fn strip_noise(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}
