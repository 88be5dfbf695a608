//! `data:<mime>;base64,<payload>` helpers for frame images.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

pub fn encode(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

/// Split a data URL into `(mime_type, base64_payload)`.
///
/// Returns `None` for anything not starting with `data:`. The mime type is
/// whatever sits between `data:` and the first `;` of the header; a missing
/// or empty one falls back to `image/jpeg`.
pub fn split(url: &str) -> Option<(&str, &str)> {
    if !url.starts_with("data:") {
        return None;
    }
    let (meta, payload) = url.split_once(',').unwrap_or((url, ""));
    let mime = meta
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(';'))
        .map(|(mime, _)| mime)
        .filter(|mime| !mime.trim().is_empty())
        .unwrap_or(DEFAULT_IMAGE_MIME);
    Some((mime, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_and_splits() {
        let url = encode("image/png", b"abc");
        assert_eq!(url, "data:image/png;base64,YWJj");
        assert_eq!(split(&url), Some(("image/png", "YWJj")));
    }

    #[test]
    fn missing_mime_defaults_to_jpeg() {
        assert_eq!(split("data:,AAAA"), Some(("image/jpeg", "AAAA")));
        assert_eq!(split("data:image/webp,AAAA"), Some(("image/jpeg", "AAAA")));
        assert_eq!(split("data:;base64,AAAA"), Some(("image/jpeg", "AAAA")));
    }

    #[test]
    fn non_data_urls_are_rejected() {
        assert_eq!(split("https://example.com/a.jpg"), None);
    }
}
