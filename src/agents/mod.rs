//! Model-backed agents. Each one builds an instruction, sends it through a
//! [`ModelGateway`](crate::gateway::ModelGateway) with the frame images and
//! turns the untrusted JSON reply into a complete record via a named
//! `fill_*_defaults` function.

pub mod prompts;
pub mod scene_prompts;
pub mod style;
pub mod voiceover;

use serde_json::Value;

/// Suffix every generated image/video prompt must carry
pub const STYLE_TOKEN_MARKER: &str = "[Global Style Token PRO+]";

/// Append the style-token marker unless the text already contains it
pub fn ensure_style_marker(text: &str) -> String {
    if text.contains(STYLE_TOKEN_MARKER) {
        return text.to_string();
    }
    let text = text.trim_end();
    if text.is_empty() {
        STYLE_TOKEN_MARKER.to_string()
    } else {
        format!("{} {}", text, STYLE_TOKEN_MARKER)
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// A number the model sent either as a JSON number or as a numeric string
pub(crate) fn loose_number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Non-blank text; numbers are kept as their JSON spelling, anything else is missing
pub(crate) fn loose_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => non_empty(Some(s)),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn marker_is_appended_once() {
        let once = ensure_style_marker("A red kite over dunes.");
        assert_eq!(once, "A red kite over dunes. [Global Style Token PRO+]");
        assert_eq!(ensure_style_marker(&once), once);
    }

    #[test]
    fn empty_text_becomes_bare_marker() {
        assert_eq!(ensure_style_marker(""), STYLE_TOKEN_MARKER);
        assert_eq!(ensure_style_marker("   "), STYLE_TOKEN_MARKER);
    }

    #[test]
    fn loose_values_accept_numeric_strings() {
        assert_eq!(loose_number(Some(&json!(12))), Some(12.0));
        assert_eq!(loose_number(Some(&json!(" 7.5 "))), Some(7.5));
        assert_eq!(loose_number(Some(&json!("left"))), None);
        assert_eq!(loose_number(Some(&json!(null))), None);
        assert_eq!(loose_number(None), None);

        assert_eq!(loose_text(Some(json!("bold"))), Some("bold".to_string()));
        assert_eq!(loose_text(Some(json!(24))), Some("24".to_string()));
        assert_eq!(loose_text(Some(json!("  "))), None);
        assert_eq!(loose_text(Some(json!({ "name": "bold" }))), None);
    }

    #[test]
    fn marker_anywhere_counts() {
        let text = "[Global Style Token PRO+] then more words";
        assert_eq!(ensure_style_marker(text), text);
    }
}
