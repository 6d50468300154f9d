use serde_json::Value;

const FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";

/// Parse the JSON payload of a model answer.
///
/// The first ```` ```json ```` fenced block wins; without one the whole text
/// must be JSON.
pub fn extract_json(text: &str) -> Result<Value, String> {
    if let Some(start) = text.find(FENCE_OPEN) {
        let body = &text[start + FENCE_OPEN.len()..];
        let end = body
            .find(FENCE_CLOSE)
            .ok_or_else(|| "unterminated ```json block".to_string())?;
        return serde_json::from_str(body[..end].trim())
            .map_err(|e| format!("invalid JSON in ```json block: {e}"));
    }
    serde_json::from_str(text.trim()).map_err(|e| format!("answer is not JSON: {e}"))
}
