//! Per-dialect line recognizers.
//!
//! Each dialect answers for the action kinds it knows how to spell. Adding a
//! scripting style means adding a [`Dialect`], not editing the others.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::{ActionKind, StepAction};

/// Local variable name -> selector it was bound to.
pub type Bindings = HashMap<String, String>;

pub trait Dialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Recognize `line` as an action of `kind`, if this dialect spells it.
    fn recognize(&self, kind: ActionKind, line: &str, bindings: &Bindings) -> Option<StepAction>;
}

static STRING_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']([^"']+)["']"#).expect("Invalid regex"));

static MAYBE_EMPTY_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']([^"']*)["']"#).expect("Invalid regex"));

/// First non-empty quoted literal on the line.
pub(crate) fn first_literal(line: &str) -> Option<String> {
    STRING_LITERAL
        .captures(line)
        .map(|caps| caps[1].to_string())
}

/// Quoted argument of `.method(`, allowing an empty literal.
fn call_literal(line: &str, method: &str) -> Option<String> {
    let pattern = format!(r#"\.{}\(\s*["']([^"']*)["']"#, regex::escape(method));
    Regex::new(&pattern)
        .ok()?
        .captures(line)
        .map(|caps| caps[1].to_string())
}

/// Selector targeted by `<receiver>.method(`.
///
/// Handles an inline `locator("sel").method(`, `page.method("sel", ...)`, and a
/// variable bound earlier; an unbound variable name is returned as-is.
fn receiver_selector(line: &str, method: &str, bindings: &Bindings) -> Option<String> {
    let method = regex::escape(method);

    let inline = format!(r#"locator\(\s*["']([^"']+)["']\s*\)\.{method}\("#);
    if let Some(caps) = Regex::new(&inline).ok()?.captures(line) {
        return Some(caps[1].to_string());
    }

    let receiver = format!(r#"(\w+)\.{method}\("#);
    let caps = Regex::new(&receiver).ok()?.captures(line)?;
    let name = &caps[1];
    if name == "page" {
        let direct = format!(r#"page\.{method}\(\s*["']([^"']+)["']"#);
        return Regex::new(&direct)
            .ok()?
            .captures(line)
            .map(|caps| caps[1].to_string());
    }
    Some(bindings.get(name).cloned().unwrap_or_else(|| name.to_string()))
}

/// Last quoted argument of a `.method(...)` call, or empty.
fn last_call_literal(line: &str, method: &str) -> String {
    let pattern = format!(r#"\.{}\(([^)]*)\)"#, regex::escape(method));
    let Some(args) = Regex::new(&pattern)
        .ok()
        .and_then(|re| re.captures(line))
        .map(|caps| caps[1].to_string())
    else {
        return String::new();
    };
    MAYBE_EMPTY_LITERAL
        .captures_iter(&args)
        .last()
        .map(|caps| caps[1].to_string())
        .unwrap_or_default()
}

fn type_action(line: &str, method: &str, bindings: &Bindings) -> Option<StepAction> {
    if !line.contains(&format!(".{method}(")) {
        return None;
    }
    let selector = receiver_selector(line, method, bindings)?;
    let text = last_call_literal(line, method);
    // `page.fill(sel)` with a single literal: that literal is the selector, not text.
    let text = if line.contains(&format!("page.{method}(")) && text == selector {
        String::new()
    } else {
        text
    };
    Some(StepAction::Type { selector, text })
}

fn load_state_action(line: &str, call: &str) -> Option<StepAction> {
    if !line.contains(&format!("{call}(")) {
        return None;
    }
    let state = call_literal(line, call).filter(|state| !state.is_empty());
    Some(StepAction::WaitLoad {
        state: state.unwrap_or_else(|| "load".to_string()),
    })
}

fn selector_wait_action(line: &str, call: &str) -> Option<StepAction> {
    if !line.contains(&format!("{call}(")) {
        return None;
    }
    first_literal(line).map(|selector| StepAction::Wait { selector })
}

/// Calls spelled the same in every Playwright binding.
pub struct CommonDialect;

impl Dialect for CommonDialect {
    fn name(&self) -> &'static str {
        "common"
    }

    fn recognize(&self, kind: ActionKind, line: &str, bindings: &Bindings) -> Option<StepAction> {
        match kind {
            ActionKind::Navigate if line.contains(".goto(") => {
                first_literal(line).map(|url| StepAction::Navigate { url })
            }
            ActionKind::Type => type_action(line, "fill", bindings),
            ActionKind::Click if line.contains(".click(") => {
                receiver_selector(line, "click", bindings).map(|selector| StepAction::Click { selector })
            }
            ActionKind::Press if line.contains(".press(") => {
                let key = Some(last_call_literal(line, "press"))
                    .filter(|key| !key.is_empty())
                    .or_else(|| first_literal(line))?;
                let selector = receiver_selector(line, "press", bindings)
                    .filter(|selector| *selector != key && selector != "page" && selector != "keyboard");
                Some(StepAction::Press { key, selector })
            }
            _ => None,
        }
    }
}

/// Python: snake_case waits.
pub struct PythonDialect;

impl Dialect for PythonDialect {
    fn name(&self) -> &'static str {
        "python"
    }

    fn recognize(&self, kind: ActionKind, line: &str, _bindings: &Bindings) -> Option<StepAction> {
        match kind {
            ActionKind::WaitLoad => load_state_action(line, "wait_for_load_state"),
            ActionKind::Wait => selector_wait_action(line, "wait_for_selector"),
            _ => None,
        }
    }
}

/// TypeScript and JavaScript: camelCase waits and `locator.type(...)`.
pub struct ScriptDialect;

impl Dialect for ScriptDialect {
    fn name(&self) -> &'static str {
        "typescript"
    }

    fn recognize(&self, kind: ActionKind, line: &str, bindings: &Bindings) -> Option<StepAction> {
        match kind {
            ActionKind::Type if !line.contains("page.type(") => type_action(line, "type", bindings),
            ActionKind::WaitLoad => load_state_action(line, "waitForLoadState"),
            ActionKind::Wait => selector_wait_action(line, "waitForSelector"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receiver_resolves_inline_page_and_bound_forms() {
        let mut bindings = Bindings::new();
        bindings.insert("searchBox".to_string(), "#kw".to_string());

        assert_eq!(
            receiver_selector("await page.locator('#go').click()", "click", &bindings).as_deref(),
            Some("#go")
        );
        assert_eq!(
            receiver_selector("page.click(\"#submit\")", "click", &bindings).as_deref(),
            Some("#submit")
        );
        assert_eq!(
            receiver_selector("await searchBox.click()", "click", &bindings).as_deref(),
            Some("#kw")
        );
        assert_eq!(
            receiver_selector("unknown.click()", "click", &bindings).as_deref(),
            Some("unknown")
        );
    }

    #[test]
    fn fill_takes_last_literal_as_text() {
        let bindings = Bindings::new();
        assert_eq!(
            type_action("page.fill('#q', 'rust')", "fill", &bindings),
            Some(StepAction::Type {
                selector: "#q".to_string(),
                text: "rust".to_string()
            })
        );
        assert_eq!(
            type_action("box.fill('')", "fill", &bindings),
            Some(StepAction::Type {
                selector: "box".to_string(),
                text: String::new()
            })
        );
    }

    #[test]
    fn press_with_selector_takes_last_literal_as_key() {
        let action = CommonDialect.recognize(
            ActionKind::Press,
            "page.press('#q', 'Enter')",
            &Bindings::new(),
        );
        assert_eq!(
            action,
            Some(StepAction::Press {
                key: "Enter".to_string(),
                selector: Some("#q".to_string())
            })
        );
    }

    #[test]
    fn press_on_page_keyboard_has_no_selector() {
        let action = CommonDialect.recognize(
            ActionKind::Press,
            "await page.keyboard.press('Enter')",
            &Bindings::new(),
        );
        assert_eq!(
            action,
            Some(StepAction::Press {
                key: "Enter".to_string(),
                selector: None
            })
        );
    }
}
