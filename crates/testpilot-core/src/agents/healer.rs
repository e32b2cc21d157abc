//! Healer: diagnose a failed execution and ask the model for a corrected script.

use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};

use anyhow::{Result, bail};
use chrono::Utc;
use regex::Regex;
use serde_json::{Value, json};
use similar::{ChangeTag, TextDiff};
use testpilot_ai::TextGenerator;
use testpilot_browser::{
    ActionClient, LocalOptions, actions, close_quietly, page_scripts, timeouts,
};
use tracing::{error, info, warn};

use super::completion::{complete, first_code_block, reject_error_envelope};
use super::prompts;
use super::scoring::{ConfidenceWeights, describe_fix};
use crate::backend::BackendFactory;
use crate::models::{
    ChangeImpact, ChangeKind, CodeChange, Execution, GeneratedCode, HealRecord, HealStatus,
};

const ANALYSIS_TEMPERATURE: f32 = 0.3;
const ANALYSIS_MAX_TOKENS: u32 = 1500;
const FIX_TEMPERATURE: f32 = 0.2;
const FIX_MAX_TOKENS: u32 = 4000;
const INVENTORY_LIMIT: usize = 20;
const DIFF_CONTEXT: usize = 3;

const WAIT_KEYWORDS: [&str; 5] = ["wait", "waitfor", "waituntil", "sleep", "delay"];
const ERROR_HANDLING_KEYWORDS: [&str; 5] = ["try", "catch", "except", "finally", "rescue"];
const ASSERTION_KEYWORDS: [&str; 5] = ["expect", "assert", "should", "toBe", "toEqual"];
const RETRY_KEYWORDS: [&str; 3] = ["retry", "attempt", "repeat"];

static SELECTOR_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:getByRole|getByText|getByLabel|locator)\(['"]([^'"]+)['"]"#)
        .expect("Invalid regex")
});

/// Everything a successful heal produces.
#[derive(Debug, Clone)]
struct HealOutcome {
    analysis: String,
    fixed_code: String,
    changes: Vec<CodeChange>,
    confidence: f64,
    page_state: Option<Value>,
}

pub struct Healer {
    factory: Arc<dyn BackendFactory>,
    generator: Arc<dyn TextGenerator>,
    weights: ConfidenceWeights,
}

impl Healer {
    pub fn new(factory: Arc<dyn BackendFactory>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            factory,
            generator,
            weights: ConfidenceWeights::default(),
        }
    }

    pub fn with_weights(mut self, weights: ConfidenceWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Drive `record` from `healing` to `success` or `failed`.
    ///
    /// On success the returned code is the unsaved fixed sibling of
    /// `original`, already linked from `record.fixed_code_id`.
    pub async fn heal(
        &self,
        record: &mut HealRecord,
        execution: &Execution,
        original: &GeneratedCode,
        url: Option<&str>,
    ) -> Option<GeneratedCode> {
        info!(heal_id = %record.id, execution_id = %execution.id, "Healing failed execution");

        let fixed = match self.run(execution, original, url).await {
            Ok(outcome) => {
                let fixed = original.derive_fixed(outcome.fixed_code);
                record.fix_description = describe_fix(&outcome.changes);
                record.error_analysis = outcome.analysis;
                record.changes = outcome.changes;
                record.confidence = outcome.confidence;
                record.page_state = outcome.page_state;
                record.fixed_code_id = Some(fixed.id.clone());
                record.status = HealStatus::Success;
                info!(
                    heal_id = %record.id,
                    fixed_code_id = %fixed.id,
                    confidence = record.confidence,
                    changes = record.changes.len(),
                    "Heal succeeded"
                );
                Some(fixed)
            }
            Err(err) => {
                error!(heal_id = %record.id, error = %err, "Heal failed");
                record.status = HealStatus::Failed;
                record.error_analysis = format!("{err:#}");
                None
            }
        };
        record.updated_at = Utc::now();
        fixed
    }

    async fn run(&self, execution: &Execution, original: &GeneratedCode, url: Option<&str>) -> Result<HealOutcome> {
        let page_state = match url.filter(|url| !url.trim().is_empty()) {
            Some(url) => self.probe_page(url).await,
            None => None,
        };

        let analysis_prompt = prompts::error_analysis(
            &original.code,
            original.language,
            execution.error_message.as_deref().unwrap_or_default(),
            &execution.stderr,
        );
        let analysis = complete(
            self.generator.as_ref(),
            "failure analysis",
            &analysis_prompt,
            ANALYSIS_TEMPERATURE,
            ANALYSIS_MAX_TOKENS,
        )
        .await?;
        reject_error_envelope(&analysis)?;

        let fix_prompt = prompts::fix(&original.code, original.language, &analysis, page_state.as_ref());
        let response = complete(
            self.generator.as_ref(),
            "code fix",
            &fix_prompt,
            FIX_TEMPERATURE,
            FIX_MAX_TOKENS,
        )
        .await?;
        reject_error_envelope(&response)?;

        let fixed_code = first_code_block(&response);
        if fixed_code.is_empty() {
            bail!("Model returned no fixed code");
        }

        let changes = detect_changes(&original.code, &fixed_code);
        let confidence = self.weights.score(&changes, page_state.as_ref());
        Ok(HealOutcome {
            analysis: analysis.trim().to_string(),
            fixed_code,
            changes,
            confidence,
            page_state,
        })
    }

    /// Fresh selector inventory from the live page; `None` when the probe fails.
    async fn probe_page(&self, url: &str) -> Option<Value> {
        let mut client = self.factory.local(LocalOptions::default());
        let state = match probe_session(client.as_mut(), url).await {
            Ok(state) => Some(state),
            Err(err) => {
                warn!(url, error = %err, "Page probe failed, healing without page state");
                None
            }
        };
        close_quietly(client.as_mut()).await;
        state
    }
}

async fn probe_session(client: &mut dyn ActionClient, url: &str) -> Result<Value> {
    client.initialize().await?;
    client
        .call_action(
            actions::NAVIGATE,
            json!({ "url": url, "wait_until": "networkidle", "timeout": timeouts::NAVIGATION_MS }),
        )
        .await?;
    let output = client
        .call_action(actions::EVALUATE, json!({ "script": page_scripts::SELECTOR_INVENTORY }))
        .await?;
    let inventory = output.get("result").cloned().unwrap_or_else(|| output.into_value());

    let entries = |key: &str, require_text: bool| -> Vec<Value> {
        inventory
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| {
                        !require_text
                            || item
                                .get("text")
                                .and_then(Value::as_str)
                                .is_some_and(|text| !text.trim().is_empty())
                    })
                    .take(INVENTORY_LIMIT)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    };

    Ok(json!({
        "title": inventory.get("title").and_then(Value::as_str).unwrap_or_default(),
        "url": inventory.get("url").and_then(Value::as_str).unwrap_or(url),
        "available_selectors": {
            "buttons": entries("buttons", true),
            "links": entries("links", true),
            "inputs": entries("inputs", false),
        }
    }))
}

/// Selector literals passed to the common locator calls.
pub fn extract_selectors(code: &str) -> BTreeSet<String> {
    SELECTOR_CALL
        .captures_iter(code)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Structured summary of what changed between `original` and `fixed`.
///
/// Keyword tags only look at lines that are new in `fixed`.
pub fn detect_changes(original: &str, fixed: &str) -> Vec<CodeChange> {
    let mut changes = Vec::new();
    let original_lines: Vec<&str> = original.lines().collect();
    let fixed_lines: Vec<&str> = fixed.lines().collect();

    if original_lines != fixed_lines {
        let before = normalized(&original_lines);
        let after = normalized(&fixed_lines);
        let diff = TextDiff::from_lines(&before, &after);
        let (mut added, mut removed) = (0, 0);
        for change in diff.iter_all_changes() {
            match change.tag() {
                ChangeTag::Insert => added += 1,
                ChangeTag::Delete => removed += 1,
                ChangeTag::Equal => {}
            }
        }
        let mut change = CodeChange::tagged(
            ChangeKind::CodeModification,
            "modified the test code to fix the failure",
            ChangeImpact::Low,
        );
        change.diff = Some(
            diff.unified_diff()
                .context_radius(DIFF_CONTEXT)
                .header("original", "fixed")
                .to_string(),
        );
        change.lines_added = Some(added);
        change.lines_removed = Some(removed);
        changes.push(change);
    }

    let new_lines: Vec<&str> = fixed_lines
        .iter()
        .copied()
        .filter(|line| !original_lines.contains(line))
        .collect();
    let any_new = |keywords: &[&str], fold_case: bool| {
        new_lines.iter().any(|line| {
            let line = if fold_case { line.to_lowercase() } else { line.to_string() };
            keywords.iter().any(|keyword| line.contains(keyword))
        })
    };

    if any_new(&WAIT_KEYWORDS[..], true) {
        changes.push(CodeChange::tagged(
            ChangeKind::WaitAdded,
            "added waits to handle timing issues",
            ChangeImpact::High,
        ));
    }
    if any_new(&ERROR_HANDLING_KEYWORDS[..], false) {
        changes.push(CodeChange::tagged(
            ChangeKind::ErrorHandlingAdded,
            "added error handling",
            ChangeImpact::Medium,
        ));
    }

    let before = extract_selectors(original);
    let after = extract_selectors(fixed);
    if before != after {
        let mut change = CodeChange::tagged(
            ChangeKind::SelectorUpdated,
            "updated element selectors for reliability",
            ChangeImpact::High,
        );
        change.added_selectors = after.difference(&before).cloned().collect();
        change.removed_selectors = before.difference(&after).cloned().collect();
        changes.push(change);
    }

    if any_new(&ASSERTION_KEYWORDS[..], false) {
        changes.push(CodeChange::tagged(
            ChangeKind::AssertionUpdated,
            "updated assertions",
            ChangeImpact::Medium,
        ));
    }
    if any_new(&RETRY_KEYWORDS[..], true) {
        changes.push(CodeChange::tagged(
            ChangeKind::RetryAdded,
            "added retries for stability",
            ChangeImpact::Medium,
        ));
    }

    changes
}

fn normalized(lines: &[&str]) -> String {
    lines.iter().map(|line| format!("{line}\n")).collect()
}
