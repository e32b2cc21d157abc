//! Step extraction: turns generated test source into replayable browser actions.
//!
//! The scan is line oriented. Blank and comment lines are skipped, locator
//! assignments feed a variable -> selector table, and every other line is
//! offered to the dialects one action kind at a time in a fixed priority
//! order. Unrecognized lines are ignored.

pub mod dialect;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use dialect::{Bindings, CommonDialect, Dialect, PythonDialect, ScriptDialect};

const COMMENT_PREFIXES: [&str; 6] = ["#", "//", "\"\"\"", "'''", "/*", "*"];

static LOCATOR_BINDING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\w+)\s*=\s*(?:await\s+)?page\.locator\(["']([^"']+)["']\)"#)
        .expect("Invalid regex")
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepAction {
    Navigate {
        url: String,
    },
    Type {
        selector: String,
        text: String,
    },
    Click {
        selector: String,
    },
    Press {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
    },
    WaitLoad {
        state: String,
    },
    Wait {
        selector: String,
    },
    /// Stand-in when nothing in the source was recognizable.
    Execute,
}

impl StepAction {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Navigate { .. } => "navigate",
            Self::Type { .. } => "type",
            Self::Click { .. } => "click",
            Self::Press { .. } => "press",
            Self::WaitLoad { .. } => "wait_load",
            Self::Wait { .. } => "wait",
            Self::Execute => "execute",
        }
    }
}

/// Recognition order; the first kind a line matches wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Navigate,
    Type,
    Click,
    Press,
    WaitLoad,
    Wait,
}

pub const PRIORITY: [ActionKind; 6] = [
    ActionKind::Navigate,
    ActionKind::Type,
    ActionKind::Click,
    ActionKind::Press,
    ActionKind::WaitLoad,
    ActionKind::Wait,
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    pub step_number: usize,
    pub description: String,
    #[serde(flatten)]
    pub action: StepAction,
}

pub struct StepExtractor {
    dialects: Vec<Box<dyn Dialect>>,
}

impl Default for StepExtractor {
    fn default() -> Self {
        Self::new(vec![
            Box::new(CommonDialect),
            Box::new(PythonDialect),
            Box::new(ScriptDialect),
        ])
    }
}

impl StepExtractor {
    pub fn new(dialects: Vec<Box<dyn Dialect>>) -> Self {
        Self { dialects }
    }

    /// Extract steps numbered `1..=N`; never empty.
    pub fn extract(&self, source: &str) -> Vec<Step> {
        let mut bindings = Bindings::new();
        let mut actions: Vec<(StepAction, String)> = Vec::new();

        for raw in source.lines() {
            let line = raw.trim();
            if line.is_empty() || COMMENT_PREFIXES.iter().any(|prefix| line.starts_with(prefix)) {
                continue;
            }

            if line.contains("page.locator(")
                && let Some(caps) = LOCATOR_BINDING.captures(line)
            {
                bindings.insert(caps[1].to_string(), caps[2].to_string());
                continue;
            }

            if let Some((action, hint)) = self.recognize(line, &bindings) {
                actions.push((action, hint));
            }
        }

        if actions.is_empty() {
            actions.push((StepAction::Execute, String::new()));
        }

        let steps: Vec<Step> = actions
            .into_iter()
            .enumerate()
            .map(|(index, (action, hint))| Step {
                step_number: index + 1,
                description: describe(&action, &hint),
                action,
            })
            .collect();

        tracing::debug!(
            count = steps.len(),
            actions = ?steps.iter().map(|s| s.action.tag()).collect::<Vec<_>>(),
            "Extracted steps"
        );
        steps
    }

    fn recognize(&self, line: &str, bindings: &Bindings) -> Option<(StepAction, String)> {
        for kind in PRIORITY {
            for dialect in &self.dialects {
                if let Some(action) = dialect.recognize(kind, line, bindings) {
                    return Some((action, receiver_name(line)));
                }
            }
        }
        None
    }
}

/// Convenience wrapper over the default dialect set.
pub fn extract_steps(source: &str) -> Vec<Step> {
    StepExtractor::default().extract(source)
}

/// Identifier the call was made on, lowercased; used only for descriptions.
fn receiver_name(line: &str) -> String {
    static RECEIVER: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(\w+)\.(?:fill|type|click|press)\(").expect("Invalid regex")
    });
    RECEIVER
        .captures(line)
        .map(|caps| caps[1].to_lowercase())
        .unwrap_or_default()
}

pub fn key_label(key: &str) -> &str {
    match key {
        "Enter" => "Enter/Return",
        "Escape" => "Escape",
        "Tab" => "Tab",
        "Backspace" => "Backspace",
        other => other,
    }
}

pub fn load_state_label(state: &str) -> &str {
    match state {
        "networkidle" => "network idle",
        "load" => "page load",
        "domcontentloaded" => "DOM content loaded",
        other => other,
    }
}

fn describe(action: &StepAction, hint: &str) -> String {
    match action {
        StepAction::Navigate { url } => format!("open {url}"),
        StepAction::Type { selector, text } => {
            let target = if hint.contains("search") || selector.to_lowercase().contains("search") {
                "the search box"
            } else {
                "the input"
            };
            if text.is_empty() {
                format!("clear {target}")
            } else {
                format!("type '{text}' into {target}")
            }
        }
        StepAction::Click { selector } => {
            if hint.contains("button") || hint.contains("btn") {
                "click the button".to_string()
            } else if hint.contains("link") {
                "click the link".to_string()
            } else {
                format!("click {selector}")
            }
        }
        StepAction::Press { key, .. } => format!("press the {} key", key_label(key)),
        StepAction::WaitLoad { state } => format!("wait for {}", load_state_label(state)),
        StepAction::Wait { selector } => format!("wait for {selector} to appear"),
        StepAction::Execute => "execute test code".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PYTHON_SCRIPT: &str = r##"
# -*- coding: utf-8 -*-
import pytest
from playwright.sync_api import Page, expect

def test_search(page: Page):
    """Search for a term."""
    page.goto("https://example.com")
    search_input = page.locator("#kw")
    search_input.fill("rust")
    search_input.press("Enter")
    page.wait_for_load_state("networkidle")
    page.wait_for_selector(".result")
"##;

    const TS_SCRIPT: &str = r#"
import { test, expect } from '@playwright/test';

test('search', async ({ page }) => {
  // open the page
  await page.goto('https://example.com');
  const submitButton = await page.locator('#su');
  await page.locator('#kw').type('playwright');
  await submitButton.click();
  await page.waitForLoadState('domcontentloaded');
  await page.waitForSelector('#content_left');
});
"#;

    fn tags(steps: &[Step]) -> Vec<&'static str> {
        steps.iter().map(|step| step.action.tag()).collect()
    }

    #[test]
    fn python_script_yields_ordered_steps() {
        let steps = extract_steps(PYTHON_SCRIPT);
        assert_eq!(
            tags(&steps),
            vec!["navigate", "type", "press", "wait_load", "wait"]
        );
        let numbers: Vec<usize> = steps.iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);

        assert_eq!(
            steps[1].action,
            StepAction::Type {
                selector: "#kw".to_string(),
                text: "rust".to_string()
            }
        );
        assert_eq!(steps[1].description, "type 'rust' into the search box");
        assert_eq!(steps[2].description, "press the Enter/Return key");
        assert_eq!(steps[3].description, "wait for network idle");
    }

    #[test]
    fn typescript_script_resolves_bound_variables() {
        let steps = extract_steps(TS_SCRIPT);
        assert_eq!(
            tags(&steps),
            vec!["navigate", "type", "click", "wait_load", "wait"]
        );
        assert_eq!(
            steps[2].action,
            StepAction::Click {
                selector: "#su".to_string()
            }
        );
        assert_eq!(steps[2].description, "click the button");
        assert_eq!(steps[3].description, "wait for DOM content loaded");
    }

    #[test]
    fn later_reference_resolves_to_bound_selector() {
        let steps = extract_steps("x = page.locator(\"#foo\")\nx.click()\n");
        assert_eq!(steps.len(), 1);
        assert_eq!(
            steps[0].action,
            StepAction::Click {
                selector: "#foo".to_string()
            }
        );
    }

    #[test]
    fn unrecognized_source_yields_single_execute_step() {
        let steps = extract_steps("// nothing here\nconst x = 1;\n\n");
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].step_number, 1);
        assert_eq!(steps[0].action, StepAction::Execute);
        assert_eq!(steps[0].description, "execute test code");
    }

    #[test]
    fn load_wait_without_literal_defaults_to_load() {
        let steps = extract_steps("page.wait_for_load_state()");
        assert_eq!(
            steps[0].action,
            StepAction::WaitLoad {
                state: "load".to_string()
            }
        );
    }

    #[test]
    fn step_serializes_with_action_tag() {
        let steps = extract_steps("await page.goto('https://example.com')");
        let value = serde_json::to_value(&steps[0]).unwrap();
        assert_eq!(value["action"], "navigate");
        assert_eq!(value["url"], "https://example.com");
        assert_eq!(value["step_number"], 1);
    }
}
