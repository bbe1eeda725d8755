use crate::error::GatewayError;
use serde_json::Value;

const FENCE: &str = "```";

/// Returns the body of the first markdown code fence, or the trimmed text when there is none.
///
/// Fences only count at the start of a line, and a fence tagged ```` ```json ```` is preferred
/// over an untagged one. Clean input is returned unchanged apart from surrounding whitespace.
pub fn strip_code_fence(text: &str) -> &str {
    if let Some(body) = tagged_json_fence(text) {
        return body.trim();
    }
    if let Some(body) = any_fence(text) {
        return body.trim();
    }
    text.trim()
}

/// Position just past the first `marker` that starts a line.
fn line_start(text: &str, marker: &str) -> Option<usize> {
    text.match_indices(marker)
        .find(|(i, _)| *i == 0 || text[..*i].ends_with('\n'))
        .map(|(i, _)| i + marker.len())
}

/// End of the fence body: a closing fence on its own line, else the next fence at all.
fn closing_fence(body: &str) -> Option<usize> {
    body.find(&format!("\n{FENCE}")).or_else(|| body.find(FENCE))
}

fn tagged_json_fence(text: &str) -> Option<&str> {
    let rest = &text[line_start(text, "```json")?..];
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))?;
    Some(&rest[..closing_fence(rest)?])
}

fn any_fence(text: &str) -> Option<&str> {
    let rest = &text[line_start(text, FENCE)?..];
    let body = &rest[..closing_fence(rest)?];

    // Drop a language tag sitting on the opening line, e.g. ```JSON or ```javascript.
    match body.find('\n') {
        Some(newline)
            if body[..newline]
                .trim_end_matches('\r')
                .chars()
                .all(|c| c.is_ascii_alphanumeric()) =>
        {
            Some(&body[newline + 1..])
        }
        _ => Some(body),
    }
}

/// Outermost `{...}` span of `text`, if any.
fn embedded_object(text: &str) -> Option<Value> {
    let open = text.find('{')?;
    let close = text.rfind('}')?;
    if open >= close {
        return None;
    }
    serde_json::from_str(&text[open..=close]).ok()
}

/// Unwraps and parses a model answer that should be a single JSON object.
///
/// Text that already parses is taken as is, so fences inside string values are left alone.
/// Otherwise the fenced body is tried, then the outermost braces of the fenced body and of
/// the raw text.
pub fn parse_json_object(text: &str) -> Result<Value, GatewayError> {
    let raw = text.trim();
    if raw.is_empty() {
        return Err(GatewayError::ResponseShape("empty JSON payload".to_string()));
    }

    let value = match serde_json::from_str::<Value>(raw) {
        Ok(value) => value,
        Err(raw_err) => {
            let cleaned = strip_code_fence(raw);
            let parsed = serde_json::from_str::<Value>(cleaned)
                .ok()
                .or_else(|| embedded_object(cleaned))
                .or_else(|| embedded_object(raw));
            match parsed {
                Some(value) => value,
                None => {
                    return Err(GatewayError::ResponseShape(format!(
                        "invalid JSON: {raw_err}"
                    )))
                }
            }
        }
    };

    if value.is_object() {
        Ok(value)
    } else {
        Err(GatewayError::ResponseShape(
            "expected a JSON object at the top level".to_string(),
        ))
    }
}
