//! Response envelope handling: `{code, message, result}` wrappers, paged
//! `{content: [...]}` lists and error messages in their various spots.

use serde_json::Value;

/// Strips the `{code, message, result}` wrapper. `data` is accepted in
/// place of `result` only next to another envelope key, so a bare row that
/// happens to have a `data` field is left alone.
pub fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map)
            if map.contains_key("result")
                || (map.contains_key("data")
                    && ["code", "message", "success"]
                        .iter()
                        .any(|key| map.contains_key(*key))) =>
        {
            map.remove("result")
                .filter(|result| !result.is_null())
                .or_else(|| map.remove("data"))
                .unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Flattens a paged response to its `content` array.
pub fn flatten_page(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.get("content").is_some_and(Value::is_array) => {
            map.remove("content").unwrap_or_default()
        }
        other => other,
    }
}

/// First non-empty `message`, `msg` or `error`, at the top level or nested
/// under `result`/`data`.
pub fn backend_message(body: &Value) -> Option<String> {
    fn direct(value: &Value) -> Option<String> {
        ["message", "msg", "error"].iter().find_map(|key| {
            value
                .get(*key)?
                .as_str()
                .map(str::trim)
                .filter(|message| !message.is_empty())
                .map(str::to_string)
        })
    }
    direct(body).or_else(|| {
        ["result", "data"]
            .iter()
            .find_map(|key| body.get(*key).and_then(direct))
    })
}
