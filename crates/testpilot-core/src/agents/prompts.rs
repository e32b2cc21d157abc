//! Prompt construction for the planner, generator and healer.

use serde_json::Value;
use testpilot_browser::ScriptLanguage;

use crate::models::Scenario;

/// Selector inventory entries listed per category in the fix prompt.
const FIX_SELECTOR_LIMIT: usize = 10;
const PAGE_INFO_ITEM_LIMIT: usize = 10;
const PAGE_INFO_FORM_LIMIT: usize = 5;

pub fn exploration(url: &str, max_depth: u32, requirements: Option<&str>, snapshot: &Value) -> String {
    let requirements = requirements
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| {
            format!(
                "\nUser testing requirements:\n{text}\n\nMake sure the scenarios cover these requirements.\n"
            )
        })
        .unwrap_or_default();
    let snapshot = serde_json::to_string_pretty(snapshot).unwrap_or_else(|_| "{}".to_string());

    format!(
        r#"You are an experienced web test planner with a background in quality assurance, usability testing and test scenario design.

Application URL: {url}
Exploration depth: {max_depth}
{requirements}
Page snapshot:
{snapshot}

Analyse the application from the snapshot and produce detailed test scenarios. Each scenario needs:
1. A clear, descriptive title
2. Detailed step-by-step instructions
3. The expected result
4. Assumptions about the starting state (always assume a fresh, empty state)
5. Success criteria and failure conditions

Cover happy paths, edge cases and boundary conditions, and error handling and validation.

Answer in JSON:
{{
    "test_scenarios": [
        {{
            "name": "Scenario name",
            "description": "Scenario description",
            "priority": "high/medium/low",
            "seed_file": "tests/seed.spec.ts",
            "steps": ["Step 1", "Step 2"],
            "expected_result": "Expected result",
            "assumptions": ["Assumption 1", "Assumption 2"]
        }}
    ]
}}

Produce at least 5 independent scenarios that can run in any order.
"#
    )
}

fn scenarios_text(scenarios: &[Scenario]) -> String {
    let mut text = String::new();
    for (idx, scenario) in scenarios.iter().enumerate() {
        text.push_str(&format!("\nScenario {}: {}\n", idx + 1, scenario.name));
        text.push_str(&format!("Description: {}\n", scenario.description));
        text.push_str(&format!("Priority: {}\n", scenario.priority.as_str()));
        text.push_str("Steps:\n");
        for (step_idx, step) in scenario.steps.iter().enumerate() {
            text.push_str(&format!("  {}. {}\n", step_idx + 1, step));
        }
        text.push_str(&format!("Expected result: {}\n", scenario.expected_result));
    }
    text
}

fn field<'a>(item: &'a Value, key: &str, default: &'a str) -> &'a str {
    item.get(key).and_then(Value::as_str).unwrap_or(default)
}

fn items<'a>(snapshot: &'a Value, key: &str) -> &'a [Value] {
    snapshot
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Real page structure section; empty without a snapshot.
fn page_info(snapshot: Option<&Value>) -> String {
    let Some(snapshot) = snapshot else {
        return String::new();
    };

    let mut info = String::from("\n\n## Observed page structure\n");
    info.push_str(&format!("Page title: {}\n", field(snapshot, "title", "")));
    info.push_str(&format!("Page URL: {}\n", field(snapshot, "url", "")));

    let links = items(snapshot, "links");
    if !links.is_empty() {
        info.push_str(&format!("\nLinks ({}):\n", links.len()));
        for link in links.iter().take(PAGE_INFO_ITEM_LIMIT) {
            info.push_str(&format!(
                "  - \"{}\": {}\n",
                field(link, "text", ""),
                field(link, "href", "")
            ));
        }
    }

    let buttons = items(snapshot, "buttons");
    if !buttons.is_empty() {
        info.push_str(&format!("\nButtons ({}):\n", buttons.len()));
        for button in buttons.iter().take(PAGE_INFO_ITEM_LIMIT) {
            info.push_str(&format!(
                "  - \"{}\": {}\n",
                field(button, "text", ""),
                field(button, "type", "button")
            ));
        }
    }

    let inputs = items(snapshot, "inputs");
    if !inputs.is_empty() {
        info.push_str(&format!("\nInputs ({}):\n", inputs.len()));
        for input in inputs.iter().take(PAGE_INFO_ITEM_LIMIT) {
            info.push_str(&format!(
                "  - {}: name=\"{}\", placeholder=\"{}\"\n",
                field(input, "type", "text"),
                field(input, "name", ""),
                field(input, "placeholder", "")
            ));
        }
    }

    let forms = items(snapshot, "forms");
    if !forms.is_empty() {
        info.push_str(&format!("\nForms ({}):\n", forms.len()));
        for form in forms.iter().take(PAGE_INFO_FORM_LIMIT) {
            info.push_str(&format!(
                "  - action=\"{}\", method={}, inputs={}\n",
                field(form, "action", ""),
                field(form, "method", "GET"),
                form.get("inputs").and_then(Value::as_u64).unwrap_or(0)
            ));
        }
    }

    info
}

pub fn generation(
    url: &str,
    scenarios: &[Scenario],
    snapshot: Option<&Value>,
    language: ScriptLanguage,
) -> String {
    let scenarios = scenarios_text(scenarios);
    let page_info = page_info(snapshot);

    match language {
        ScriptLanguage::Typescript => format!(
            r#"You are a senior test engineer. Write high-quality Playwright TypeScript tests for the test plan below.

Application URL: {url}

Test scenarios:
{scenarios}{page_info}

Requirements:
1. Use the @playwright/test framework
2. One test() per scenario
3. Use accurate selectors based on the real page structure
4. Include detailed assertions
5. Add appropriate waits and error handling
6. Prefer modern locators such as page.getByRole() and page.getByText()
7. Add meaningful test titles and comments
8. The code must run as-is

Answer in this shape:

```typescript
import {{ test, expect }} from '@playwright/test';

test.describe('{url} automated tests', () => {{
  test.beforeEach(async ({{ page }}) => {{
    await page.goto('{url}');
  }});

  test('scenario 1', async ({{ page }}) => {{
    // steps
  }});
}});
```

```json
{{
  "use": {{
    "baseURL": "{url}",
    "screenshot": "only-on-failure",
    "video": "retain-on-failure"
  }}
}}
```
"#
        ),
        ScriptLanguage::Python => format!(
            r#"You are a senior test engineer. Write high-quality Playwright Python tests for the test plan below.

Application URL: {url}

Test scenarios:
{scenarios}{page_info}

Requirements:
1. Use pytest and playwright
2. One test_ function per scenario
3. Use accurate selectors based on the real page structure
4. Assert with expect()
5. Add appropriate waits and error handling
6. Use the modern Playwright Python API
7. The code must run as-is

Answer in this shape:

```python
import pytest
from playwright.sync_api import Page, expect

def test_scenario_1(page: Page):
    """Scenario 1"""
    page.goto('{url}')
```

```json
{{
  "base_url": "{url}"
}}
```
"#
        ),
        ScriptLanguage::Javascript => format!(
            r#"You are a senior test engineer. Write high-quality Playwright JavaScript tests for the test plan below.

Application URL: {url}

Test scenarios:
{scenarios}{page_info}

Requirements:
1. Use the @playwright/test framework
2. One test() per scenario
3. Use accurate selectors based on the real page structure
4. Include detailed assertions
5. Add appropriate waits and error handling
6. The code must run as-is

Answer in this shape:

```javascript
const {{ test, expect }} = require('@playwright/test');

test.describe('{url} automated tests', () => {{
  test.beforeEach(async ({{ page }}) => {{
    await page.goto('{url}');
  }});

  test('scenario 1', async ({{ page }}) => {{
    // steps
  }});
}});
```

```json
{{
  "use": {{
    "baseURL": "{url}"
  }}
}}
```
"#
        ),
    }
}

pub fn error_analysis(code: &str, language: ScriptLanguage, error_message: &str, stderr: &str) -> String {
    format!(
        r#"You are a senior test engineer. Work out why this Playwright test failed.

Test code ({language}):
```
{code}
```

Error message:
{error_message}

Error output:
{stderr}

Analyse:
1. What is the root cause?
2. Which factors contributed?
   - Selector problems (element missing, inaccurate selector)
   - Timing problems (element not loaded, animation unfinished)
   - Network problems (request timeout, resource failed to load)
   - Assertion problems (wrong expected value)
   - Anything else
3. What fix do you recommend?
4. How confident are you, and how urgent is the fix?

Structure your answer.
"#,
        language = language.as_str()
    )
}

/// One selector inventory category rendered for the fix prompt.
pub fn format_selectors(entries: &[Value]) -> String {
    if entries.is_empty() {
        return "(none)".to_string();
    }

    entries
        .iter()
        .take(FIX_SELECTOR_LIMIT)
        .map(|entry| {
            let mut parts = Vec::new();
            for key in ["text", "id", "name", "type"] {
                if let Some(value) = entry.get(key).and_then(Value::as_str)
                    && !value.is_empty()
                {
                    parts.push(format!("{key}=\"{value}\""));
                }
            }
            format!("  - {}", parts.join(", "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn fix(code: &str, language: ScriptLanguage, analysis: &str, page_state: Option<&Value>) -> String {
    let page_info = page_state
        .and_then(|state| state.get("available_selectors"))
        .map(|selectors| {
            let category = |key: &str| format_selectors(items(selectors, key));
            format!(
                "\n\n## Elements currently on the page\n\nButtons:\n{}\n\nLinks:\n{}\n\nInputs:\n{}\n",
                category("buttons"),
                category("links"),
                category("inputs")
            )
        })
        .unwrap_or_default();

    format!(
        r#"You are a senior test engineer. Fix the failing Playwright test below.

Original code ({language}):
```
{code}
```

Error analysis:
{analysis}{page_info}

Requirements:
1. Keep the original test logic
2. Fix what the analysis identified
3. For selector problems, use elements that actually exist on the page
4. Add the waits that are needed (waitForSelector, waitForLoadState, ...)
5. Add sensible error handling and retries
6. Prefer robust modern locators (getByRole, getByText, ...)
7. Comment what was fixed
8. The code must run as-is

Return only the complete fixed code, with no extra explanation.

```{language}
"#,
        language = language.as_str()
    )
}
