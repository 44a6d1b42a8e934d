//! Extraction of JSON objects from LLM replies.
//!
//! Models often wrap their JSON in Markdown fences. The parser strips one
//! fenced wrapper and decodes strictly; it never returns a partial object.

use serde_json::{Map, Value};
use thiserror::Error;

/// A decoded JSON object.
pub type JsonObject = Map<String, Value>;

/// Why a reply could not be turned into a JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseParseError {
    #[error("reply is not valid JSON: {0}")]
    Json(String),

    #[error("reply JSON is not an object")]
    NotAnObject,
}

/// Remove a surrounding Markdown fence from a reply.
///
/// Handles:
/// - a ```json opening fence, with the closing fence optional
/// - an untagged fence that wraps the whole text
/// - anything else, returned trimmed
pub fn strip_markdown_fence(response: &str) -> &str {
    let trimmed = response.trim();

    if let Some(rest) = trimmed.strip_prefix("```json") {
        let rest = rest.strip_suffix("```").unwrap_or(rest);
        return rest.trim();
    }

    if let Some(inner) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    {
        return inner.trim();
    }

    trimmed
}

/// Parse an LLM reply into a JSON object.
pub fn parse_json_response(response: &str) -> Result<JsonObject, ResponseParseError> {
    let payload = strip_markdown_fence(response);
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ResponseParseError::NotAnObject),
        Err(e) => Err(ResponseParseError::Json(e.to_string())),
    }
}
