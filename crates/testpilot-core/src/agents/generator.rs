//! Code generator: turn a plan's scenarios into a runnable script.

use std::sync::Arc;

use anyhow::{Result, bail};
use chrono::Utc;
use serde_json::Value;
use testpilot_ai::TextGenerator;
use testpilot_browser::ScriptLanguage;
use tracing::{error, info, warn};

use super::completion::{code_blocks, complete, reject_error_envelope};
use super::prompts;
use crate::models::{CodeStatus, GeneratedCode, TestPlan};

const GENERATE_TEMPERATURE: f32 = 0.2;
const GENERATE_MAX_TOKENS: u32 = 4000;
/// Shorter bodies are treated as a failed generation.
const MIN_CODE_CHARS: usize = 50;
/// Observed elements considered per category when sharpening selectors.
const SHARPEN_CANDIDATES: usize = 5;

/// Parsed model output.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedScript {
    pub code: String,
    pub config: Option<String>,
}

pub struct CodeGenerator {
    generator: Arc<dyn TextGenerator>,
}

impl CodeGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Drive `code` from `generating` to `completed` or `failed`.
    pub async fn generate(&self, plan: &TestPlan, code: &mut GeneratedCode) {
        info!(
            plan_id = %plan.id,
            code_id = %code.id,
            language = code.language.as_str(),
            "Generating test code"
        );

        match self.produce(plan, code.language).await {
            Ok((script, enhanced)) => {
                info!(code_id = %code.id, chars = script.code.len(), enhanced, "Code generated");
                code.code = script.code;
                code.config = script.config;
                code.enhanced = enhanced;
                code.status = CodeStatus::Completed;
                code.error_message = None;
            }
            Err(err) => {
                error!(code_id = %code.id, error = %err, "Code generation failed");
                code.status = CodeStatus::Failed;
                code.error_message = Some(format!("{err:#}"));
            }
        }
        code.updated_at = Utc::now();
    }

    async fn produce(&self, plan: &TestPlan, language: ScriptLanguage) -> Result<(GeneratedScript, bool)> {
        let snapshot = plan.usable_snapshot();
        let prompt = prompts::generation(&plan.url, &plan.test_scenarios, snapshot, language);
        let response = complete(
            self.generator.as_ref(),
            "code generation",
            &prompt,
            GENERATE_TEMPERATURE,
            GENERATE_MAX_TOKENS,
        )
        .await?;

        let mut script = parse_generated(&response)?;
        if let Some(snapshot) = snapshot {
            script.code = sharpen_selectors(&script.code, snapshot);
        }
        Ok((script, snapshot.is_some()))
    }
}

/// Validate a completion and split it into script and config.
pub fn parse_generated(response: &str) -> Result<GeneratedScript> {
    if response.trim().is_empty() {
        bail!("Model returned an empty response");
    }
    reject_error_envelope(response)?;

    let mut blocks = code_blocks(response).into_iter();
    let (code, config) = match blocks.next() {
        Some(code) => (code, blocks.next().filter(|config| !config.is_empty())),
        None => (response.trim().to_string(), None),
    };

    if code.chars().count() < MIN_CODE_CHARS {
        bail!(
            "Generated code is too short ({} chars), the model response is not a usable script",
            code.chars().count()
        );
    }
    Ok(GeneratedScript { code, config })
}

/// Qualify the first generic `button` and `a` selector with observed element text.
///
/// Only the first quoted occurrence per category changes. Never fails: when
/// nothing applies the code comes back unchanged.
pub fn sharpen_selectors(code: &str, snapshot: &Value) -> String {
    let mut sharpened = code.to_string();
    for (category, tag) in [("buttons", "button"), ("links", "a")] {
        let Some(text) = first_usable_text(snapshot, category) else {
            continue;
        };
        if let Some(updated) = qualify_first(&sharpened, tag, &text) {
            sharpened = updated;
        }
    }
    if sharpened != code {
        info!("Sharpened generic selectors from the page snapshot");
    }
    sharpened
}

fn first_usable_text(snapshot: &Value, category: &str) -> Option<String> {
    snapshot
        .get(category)?
        .as_array()?
        .iter()
        .take(SHARPEN_CANDIDATES)
        .filter_map(|item| item.get("text").and_then(Value::as_str))
        .map(str::trim)
        .find(|text| !text.is_empty() && !text.contains(['"', '\'']))
        .map(str::to_string)
}

/// Replace the first `'tag'` or `"tag"` literal with a `:has-text` variant.
fn qualify_first(code: &str, tag: &str, text: &str) -> Option<String> {
    let single = format!("'{tag}'");
    let double = format!("\"{tag}\"");
    let hit = [(code.find(&single), '\''), (code.find(&double), '"')]
        .into_iter()
        .filter_map(|(pos, quote)| pos.map(|pos| (pos, quote)))
        .min_by_key(|(pos, _)| *pos);

    let Some((pos, quote)) = hit else {
        warn!(tag, "No generic selector to sharpen");
        return None;
    };
    let inner = if quote == '"' { '\'' } else { '"' };
    let replacement = format!("{quote}{tag}:has-text({inner}{text}{inner}){quote}");

    let mut updated = String::with_capacity(code.len() + replacement.len());
    updated.push_str(&code[..pos]);
    updated.push_str(&replacement);
    updated.push_str(&code[pos + tag.len() + 2..]);
    Some(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use testpilot_ai::{ChatTextGenerator, MockLlmClient, MockStep};

    const PY_BODY: &str = "import pytest\nfrom playwright.sync_api import Page, expect\n\ndef test_home(page: Page):\n    page.goto('https://example.com')\n    page.click(\"button\")\n";

    #[test]
    fn first_block_is_code_second_is_config() {
        let response = format!("```python\n{PY_BODY}```\n\n```json\n{{\"base_url\": \"https://example.com\"}}\n```");
        let script = parse_generated(&response).unwrap();
        assert!(script.code.starts_with("import pytest"));
        assert_eq!(script.config.as_deref(), Some("{\"base_url\": \"https://example.com\"}"));
    }

    #[test]
    fn short_empty_and_error_responses_fail() {
        assert!(parse_generated("   ").is_err());
        assert!(parse_generated("```python\nprint(1)\n```").is_err());
        let err = parse_generated(r#"{"status": "434", "message": "quota exceeded"}"#).unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn unfenced_response_is_the_script() {
        let script = parse_generated(PY_BODY).unwrap();
        assert_eq!(script.code, PY_BODY.trim());
        assert!(script.config.is_none());
    }

    #[test]
    fn sharpening_touches_first_occurrence_only() {
        let snapshot = json!({
            "buttons": [{"text": ""}, {"text": "Sign in"}],
            "links": [{"text": "About"}]
        });
        let code = "await page.click('button');\nawait page.click('button');\nawait page.click(\"a\");";
        let sharpened = sharpen_selectors(code, &snapshot);
        assert_eq!(
            sharpened,
            "await page.click('button:has-text(\"Sign in\")');\nawait page.click('button');\nawait page.click(\"a:has-text('About')\");"
        );
    }

    #[test]
    fn sharpening_without_candidates_is_a_no_op() {
        let code = "page.click(\"button\")";
        assert_eq!(sharpen_selectors(code, &json!({})), code);
        assert_eq!(sharpen_selectors(code, &json!({"buttons": "oops"})), code);
        assert_eq!(sharpen_selectors("no selectors here", &json!({"buttons": [{"text": "Go"}]})), "no selectors here");
    }

    #[tokio::test]
    async fn generation_marks_code_completed() {
        let mock = Arc::new(MockLlmClient::from_steps(
            "mock",
            vec![MockStep::text(format!("```python\n{PY_BODY}```"))],
        ));
        let generator = CodeGenerator::new(Arc::new(ChatTextGenerator::new(mock.clone())));
        let plan = TestPlan::new("https://example.com", 2, 60);
        let mut code = GeneratedCode::new(&plan.id, "playwright", ScriptLanguage::Python);

        generator.generate(&plan, &mut code).await;

        assert_eq!(code.status, CodeStatus::Completed);
        assert!(code.code.contains("https://example.com"));
        assert!(!code.enhanced);
        let requests = mock.requests().await;
        assert_eq!(requests[0].temperature, Some(0.2));
    }

    #[tokio::test]
    async fn model_failure_marks_code_failed() {
        let mock = Arc::new(MockLlmClient::from_steps("mock", vec![MockStep::error("model offline")]));
        let generator = CodeGenerator::new(Arc::new(ChatTextGenerator::new(mock)));
        let plan = TestPlan::new("https://example.com", 2, 60);
        let mut code = GeneratedCode::new(&plan.id, "playwright", ScriptLanguage::Typescript);

        generator.generate(&plan, &mut code).await;

        assert_eq!(code.status, CodeStatus::Failed);
        assert!(code.error_message.unwrap().contains("code generation"));
    }
}
