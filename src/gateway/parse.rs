use serde::de::DeserializeOwned;

use crate::error::{ReplicatorError, Result};

/// Strip one leading ```` ```json ```` / ```` ``` ```` fence and one trailing
/// ```` ``` ```` from a model reply.
pub fn strip_code_fences(text: &str) -> &str {
    let mut cleaned = text.trim();

    if let Some(rest) = cleaned
        .strip_prefix("```json")
        .or_else(|| cleaned.strip_prefix("```"))
    {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }

    cleaned.trim()
}

/// Parse a model reply as strict JSON after fence stripping
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T> {
    let cleaned = strip_code_fences(text);
    serde_json::from_str(cleaned).map_err(|e| {
        tracing::error!("Failed to parse model response as JSON: {}", cleaned);
        ReplicatorError::MalformedResponse {
            message: e.to_string(),
            text: cleaned.to_string(),
        }
    })
}
