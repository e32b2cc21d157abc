//! Helpers for reading model completions: fenced code blocks and error envelopes.

use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde_json::Value;
use testpilot_ai::TextGenerator;
use tracing::debug;

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```(?:typescript|javascript|python|json|tsx|ts|jsx|js|py)?[ \t]*\n([\s\S]*?)```")
        .expect("Invalid regex")
});

/// Statuses a text service uses to answer with an error instead of a completion.
const ERROR_STATUSES: [&str; 3] = ["434", "400", "500"];

/// Ask the model once and return the raw text.
pub async fn complete(
    generator: &dyn TextGenerator,
    purpose: &str,
    prompt: &str,
    temperature: f32,
    max_tokens: u32,
) -> Result<String> {
    debug!(
        purpose,
        model = %generator.describe(),
        prompt_chars = prompt.len(),
        "Requesting completion"
    );
    let text = generator
        .generate_text(prompt, temperature, max_tokens)
        .await
        .with_context(|| format!("Model call for {purpose} failed"))?;
    debug!(purpose, response_chars = text.len(), "Completion received");
    Ok(text)
}

/// Fail when `text` is an error envelope (`{"status": "400", "message": ...}`).
pub fn reject_error_envelope(text: &str) -> Result<()> {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text.trim()) else {
        return Ok(());
    };
    let status = match map.get("status") {
        Some(Value::String(status)) => status.clone(),
        Some(Value::Number(status)) => status.to_string(),
        _ => return Ok(()),
    };
    if ERROR_STATUSES.contains(&status.as_str()) {
        let message = map
            .get("message")
            .or_else(|| map.get("error"))
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        bail!("Model service returned error {status}: {message}");
    }
    Ok(())
}

/// Contents of every fenced block, in order.
pub fn code_blocks(text: &str) -> Vec<String> {
    CODE_FENCE
        .captures_iter(text)
        .map(|caps| caps[1].trim().to_string())
        .collect()
}

/// First fenced block, or the whole response when there is none.
pub fn first_code_block(text: &str) -> String {
    code_blocks(text)
        .into_iter()
        .next()
        .unwrap_or_else(|| text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_accepts_string_and_number_status() {
        assert!(reject_error_envelope(r#"{"status": "434", "message": "quota"}"#).is_err());
        let err = reject_error_envelope(r#"{"status": 500, "message": "boom"}"#).unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert!(reject_error_envelope(r#"{"status": "ok"}"#).is_ok());
        assert!(reject_error_envelope("```python\nprint(1)\n```").is_ok());
    }

    #[test]
    fn blocks_are_taken_in_order() {
        let text = "Here:\n```typescript\nconst a = 1;\n```\nand config\n```json\n{\"x\": 1}\n```";
        let blocks = code_blocks(text);
        assert_eq!(blocks, vec!["const a = 1;".to_string(), "{\"x\": 1}".to_string()]);
    }

    #[test]
    fn language_tag_never_leaks_into_the_body() {
        let text = "```js\nlet a;\n```\n```json \n{}\n```\n```tsx\n<A />\n```";
        assert_eq!(code_blocks(text), vec!["let a;", "{}", "<A />"]);
    }

    #[test]
    fn unfenced_response_is_used_whole() {
        assert_eq!(first_code_block("  print('hi')  \n"), "print('hi')");
        assert_eq!(first_code_block("```\nraw\n```"), "raw");
    }
}
