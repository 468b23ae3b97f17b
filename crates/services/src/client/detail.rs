use reqwest::StatusCode;
use serde_json::Value;

const MAX_RAW_DETAIL_CHARS: usize = 300;

/// Turn an error response body into one human-readable line.
///
/// Understands `{"detail": "msg"}` and validation lists such as
/// `{"detail": [{"loc": ["body", "answer"], "msg": "field required"}]}`
/// (`location`/`message` spellings too). Anything else falls back to the raw
/// body, then to the status reason.
#[must_use]
pub fn flatten_detail(body: &str, status: StatusCode) -> String {
    let fallback = || {
        status
            .canonical_reason()
            .map_or_else(|| status.as_u16().to_string(), str::to_owned)
    };

    let parsed = serde_json::from_str::<Value>(body).ok();
    if let Some(detail) = parsed.as_ref().and_then(|value| value.get("detail")) {
        if let Some(text) = detail_text(detail) {
            return text;
        }
    }

    let raw = body.trim();
    if raw.is_empty() {
        return fallback();
    }
    raw.chars().take(MAX_RAW_DETAIL_CHARS).collect()
}

fn detail_text(detail: &Value) -> Option<String> {
    match detail {
        Value::String(text) => non_empty(text),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(entry_text).collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        Value::Object(_) => entry_text(detail),
        _ => None,
    }
}

fn entry_text(entry: &Value) -> Option<String> {
    if let Value::String(text) = entry {
        return non_empty(text);
    }

    let message = entry
        .get("msg")
        .or_else(|| entry.get("message"))
        .and_then(Value::as_str)
        .and_then(non_empty)?;
    let location = entry
        .get("loc")
        .or_else(|| entry.get("location"))
        .and_then(location_text);

    Some(match location {
        Some(location) => format!("{location}: {message}"),
        None => message,
    })
}

fn location_text(loc: &Value) -> Option<String> {
    match loc {
        Value::String(text) => non_empty(text),
        Value::Array(parts) => {
            let parts: Vec<String> = parts
                .iter()
                .filter_map(|part| match part {
                    Value::String(text) => Some(text.clone()),
                    Value::Number(num) => Some(num.to_string()),
                    _ => None,
                })
                .collect();
            (!parts.is_empty()).then(|| parts.join("."))
        }
        _ => None,
    }
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}
