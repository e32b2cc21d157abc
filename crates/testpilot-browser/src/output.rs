//! Decoding of heterogeneous action results.
//!
//! Remote servers answer either with a plain mapping, with an MCP tool result
//! whose content blocks carry JSON encoded as text, or with bare text. Every
//! call site goes through [`ActionOutput::extract`] so that the rest of the
//! system only ever sees one of three shapes.

use serde_json::{Map, Value, json};

/// Minimum length for a text payload to be treated as an image.
const MIN_SCREENSHOT_TEXT_LEN: usize = 100;

const SCREENSHOT_KEYS: [&str; 5] = ["screenshot", "screenshot_after", "data", "base64", "image"];

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutput {
    Mapping(Map<String, Value>),
    Text(String),
    Empty,
}

impl ActionOutput {
    /// Normalize any raw result. Never fails; unknown shapes degrade to text.
    pub fn extract(raw: Value) -> Self {
        match raw {
            Value::Null => Self::Empty,
            Value::Object(map) => {
                if let Some(content) = map.get("content").and_then(Value::as_array) {
                    return Self::from_content_blocks(&map, content);
                }
                if let Some(Value::Object(inner)) = map.get("result") {
                    return Self::Mapping(inner.clone());
                }
                Self::Mapping(map)
            }
            Value::String(text) => Self::from_text(text),
            Value::Array(items) => {
                let mut map = Map::new();
                map.insert("result".to_string(), Value::Array(items));
                Self::Mapping(map)
            }
            other => Self::Text(other.to_string()),
        }
    }

    fn from_content_blocks(envelope: &Map<String, Value>, content: &[Value]) -> Self {
        if let Some(Value::Object(structured)) = envelope.get("structuredContent") {
            return Self::Mapping(structured.clone());
        }

        for block in content {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    let text = block
                        .get("text")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    return Self::from_text(text);
                }
                Some("image") => {
                    let data = block.get("data").cloned().unwrap_or(Value::Null);
                    let mut map = Map::new();
                    map.insert("screenshot".to_string(), data);
                    return Self::Mapping(map);
                }
                _ => continue,
            }
        }

        Self::Empty
    }

    fn from_text(text: String) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Object(map)) => {
                if let Some(Value::Object(inner)) = map.get("result") {
                    return Self::Mapping(inner.clone());
                }
                Self::Mapping(map)
            }
            Ok(Value::Array(items)) => {
                let mut map = Map::new();
                map.insert("result".to_string(), Value::Array(items));
                Self::Mapping(map)
            }
            _ => Self::Text(text),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Mapping(map) => map.get(key),
            _ => None,
        }
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Array stored under `key`, or the top-level `result` array. Empty when absent.
    pub fn list(&self, key: &str) -> Vec<Value> {
        self.get(key)
            .or_else(|| self.get("result"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }

    /// Base64 screenshot payload, or an empty string when none can be found.
    pub fn screenshot(&self) -> String {
        match self {
            Self::Mapping(map) => SCREENSHOT_KEYS
                .iter()
                .filter_map(|key| map.get(*key).and_then(Value::as_str))
                .find(|value| !value.is_empty())
                .unwrap_or_default()
                .to_string(),
            Self::Text(text) => {
                let text = text.trim();
                if text.len() > MIN_SCREENSHOT_TEXT_LEN && !text.chars().all(|c| c == 'A') {
                    text.to_string()
                } else {
                    String::new()
                }
            }
            Self::Empty => String::new(),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Mapping(map) => Value::Object(map),
            Self::Text(text) => json!({ "text": text }),
            Self::Empty => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_and_blank_text_are_empty() {
        assert!(ActionOutput::extract(Value::Null).is_empty());
        assert!(ActionOutput::extract(json!("   ")).is_empty());
        assert!(ActionOutput::extract(json!({"content": []})).is_empty());
    }

    #[test]
    fn content_block_text_is_decoded_as_json() {
        let raw = json!({
            "content": [{"type": "text", "text": "{\"title\": \"Example\", \"links\": []}"}],
            "isError": false
        });
        let output = ActionOutput::extract(raw);
        assert_eq!(output.str_field("title"), Some("Example"));
    }

    #[test]
    fn content_block_plain_text_falls_back_to_text() {
        let raw = json!({"content": [{"type": "text", "text": "navigated"}]});
        assert_eq!(
            ActionOutput::extract(raw),
            ActionOutput::Text("navigated".to_string())
        );
    }

    #[test]
    fn structured_content_wins_over_text() {
        let raw = json!({
            "content": [{"type": "text", "text": "ignored"}],
            "structuredContent": {"ok": true}
        });
        assert_eq!(ActionOutput::extract(raw).get("ok"), Some(&json!(true)));
    }

    #[test]
    fn image_block_becomes_screenshot() {
        let raw = json!({"content": [{"type": "image", "data": "aGVsbG8=", "mimeType": "image/jpeg"}]});
        assert_eq!(ActionOutput::extract(raw).screenshot(), "aGVsbG8=");
    }

    #[test]
    fn result_wrapper_is_unwrapped() {
        let output = ActionOutput::extract(json!({"result": {"screenshot_after": "abc"}}));
        assert_eq!(output.screenshot(), "abc");
    }

    #[test]
    fn arrays_are_exposed_as_result_list() {
        let output = ActionOutput::extract(json!([{"url": "a"}, {"url": "b"}]));
        assert_eq!(output.list("requests").len(), 2);
    }

    #[test]
    fn screenshot_degrades_to_empty() {
        assert_eq!(ActionOutput::Empty.screenshot(), "");
        assert_eq!(ActionOutput::Text("short".to_string()).screenshot(), "");
        assert_eq!(ActionOutput::Text("A".repeat(200)).screenshot(), "");
        let long = "iVBORw0KGgo".repeat(20);
        assert_eq!(ActionOutput::Text(long.clone()).screenshot(), long);
        assert_eq!(
            ActionOutput::extract(json!({"status": "ok"})).screenshot(),
            ""
        );
    }
}
