use reword_core::errors::TransformError;

/// Extract the rewritten text from a response body, trying known envelope
/// shapes in priority order. Exhaustion yields a typed `Parse` failure
/// rather than a panic.
///
/// Shapes, most common first:
/// 1. `{"choices":[{"message":{"content":"..."}}]}`
/// 2. `{"content":[{"type":"text","text":"..."}]}`
/// 3. `{"candidates":[{"content":{"parts":[{"text":"..."}]}}]}`
/// 4. `{"text":"..."}`
pub fn parse_envelope(body: &str) -> Result<String, TransformError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| TransformError::Parse(format!("invalid JSON: {e}")))?;

    let text = chat_completion_text(&value)
        .or_else(|| content_block_text(&value))
        .or_else(|| candidate_parts_text(&value))
        .or_else(|| value.get("text").and_then(|t| t.as_str()).map(str::to_string));

    match text {
        Some(t) if !t.trim().is_empty() => Ok(t),
        Some(_) => Err(TransformError::Parse("empty completion text".into())),
        None => Err(TransformError::Parse(format!(
            "no known envelope shape matched: {}",
            truncate_for_log(body)
        ))),
    }
}

fn chat_completion_text(value: &serde_json::Value) -> Option<String> {
    value
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}

fn content_block_text(value: &serde_json::Value) -> Option<String> {
    let blocks = value.get("content")?.as_array()?;
    let joined: String = blocks
        .iter()
        .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
        .collect();
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

fn candidate_parts_text(value: &serde_json::Value) -> Option<String> {
    let parts = value
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let joined: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

/// Pull a human-readable message out of an error body, if one is present
/// in any of the common places.
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    if let Some(msg) = value.get("error").and_then(|e| e.get("message")).and_then(|m| m.as_str()) {
        return Some(msg.to_string());
    }
    if let Some(msg) = value.get("error").and_then(|e| e.as_str()) {
        return Some(msg.to_string());
    }
    value
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

fn truncate_for_log(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let boundary = (0..=MAX).rev().find(|&i| body.is_char_boundary(i)).unwrap_or(0);
        format!("{}...", &body[..boundary])
    }
}
