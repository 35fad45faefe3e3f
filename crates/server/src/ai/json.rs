//! Recovering JSON payloads from model text

use serde::de::DeserializeOwned;

/// Extract a JSON object or array from text that might contain markdown
/// code fences or a short preamble.
pub fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();

    // Bare JSON
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Some(trimmed);
    }

    // Wrapped in ```json ... ```
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return Some(after[..end].trim());
        }
    }

    // Wrapped in ``` ... ```
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            return Some(after[..end].trim());
        }
    }

    // Preamble followed by an object
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => Some(&trimmed[start..=end]),
        _ => None,
    }
}

/// Parse model text into `T`, tolerating fences around the payload
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, String> {
    let json = extract_json(text)
        .ok_or_else(|| format!("Could not extract JSON from response: {}", text.trim()))?;
    serde_json::from_str(json).map_err(|e| format!("Failed to parse JSON: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_object_is_returned_as_is() {
        assert_eq!(extract_json("  {\"a\":1} "), Some("{\"a\":1}"));
        assert_eq!(extract_json("[1,2]"), Some("[1,2]"));
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let text = "```json\n{\"type\":\"message\"}\n```";
        assert_eq!(extract_json(text), Some("{\"type\":\"message\"}"));

        let text = "Here you go:\n```\n{\"a\":2}\n```";
        assert_eq!(extract_json(text), Some("{\"a\":2}"));
    }

    #[test]
    fn preamble_before_object_is_skipped() {
        let text = "Sure! {\"a\": {\"b\": 3}} hope that helps";
        assert_eq!(extract_json(text), Some("{\"a\": {\"b\": 3}}"));
    }

    #[test]
    fn plain_prose_has_no_json() {
        assert!(extract_json("I cannot help with that").is_none());
        assert!(parse_json::<serde_json::Value>("nope").is_err());
    }
}
