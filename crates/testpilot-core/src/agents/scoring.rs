//! Heal confidence and fix description.

use serde_json::Value;

use crate::models::{ChangeImpact, ChangeKind, CodeChange};

/// Additive confidence weights. Evaluated in field order, then clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceWeights {
    pub base: f64,
    /// Fresh page state with a selector inventory was available.
    pub page_state: f64,
    /// Per high-impact selector update.
    pub selector_updated: f64,
    /// Per high-impact wait insertion.
    pub wait_added: f64,
    pub error_handling_added: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            base: 0.5,
            page_state: 0.2,
            selector_updated: 0.15,
            wait_added: 0.1,
            error_handling_added: 0.05,
        }
    }
}

impl ConfidenceWeights {
    pub fn score(&self, changes: &[CodeChange], page_state: Option<&Value>) -> f64 {
        let mut confidence = self.base;

        let has_inventory = page_state
            .and_then(|state| state.get("available_selectors"))
            .is_some_and(|selectors| match selectors {
                Value::Object(map) => !map.is_empty(),
                Value::Array(items) => !items.is_empty(),
                Value::Null => false,
                _ => true,
            });
        if has_inventory {
            confidence += self.page_state;
        }

        for change in changes {
            confidence += match (change.kind, change.impact) {
                (ChangeKind::SelectorUpdated, ChangeImpact::High) => self.selector_updated,
                (ChangeKind::WaitAdded, ChangeImpact::High) => self.wait_added,
                (ChangeKind::ErrorHandlingAdded, _) => self.error_handling_added,
                _ => 0.0,
            };
        }

        confidence.clamp(0.0, 1.0)
    }
}

/// Summary line for a set of changes, high-impact descriptions first.
pub fn describe_fix(changes: &[CodeChange]) -> String {
    if changes.is_empty() {
        return "no obvious changes detected".to_string();
    }

    let (high, rest): (Vec<&CodeChange>, Vec<&CodeChange>) = changes
        .iter()
        .filter(|change| !change.description.is_empty())
        .partition(|change| change.impact == ChangeImpact::High);
    let descriptions: Vec<&str> = high
        .iter()
        .chain(rest.iter())
        .map(|change| change.description.as_str())
        .collect();

    match descriptions.len() {
        0 => "code fixed".to_string(),
        1 => descriptions[0].to_string(),
        2..=3 => descriptions.join("; "),
        n => format!("{}; {}; and {} others", descriptions[0], descriptions[1], n - 2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn change(kind: ChangeKind, impact: ChangeImpact) -> CodeChange {
        CodeChange::tagged(kind, kind.as_str(), impact)
    }

    #[test]
    fn weights_add_up_and_clamp() {
        let weights = ConfidenceWeights::default();
        assert_eq!(weights.score(&[], None), 0.5);

        let state = json!({"available_selectors": {"buttons": []}});
        let changes = vec![
            change(ChangeKind::SelectorUpdated, ChangeImpact::High),
            change(ChangeKind::WaitAdded, ChangeImpact::High),
            change(ChangeKind::ErrorHandlingAdded, ChangeImpact::Medium),
        ];
        assert!((weights.score(&changes, Some(&state)) - 1.0).abs() < 1e-9);

        let piled: Vec<CodeChange> = (0..10)
            .map(|_| change(ChangeKind::SelectorUpdated, ChangeImpact::High))
            .collect();
        assert_eq!(weights.score(&piled, Some(&state)), 1.0);
    }

    #[test]
    fn score_stays_in_unit_interval_for_any_weights() {
        let weights = ConfidenceWeights {
            base: -3.0,
            page_state: 0.0,
            selector_updated: 0.0,
            wait_added: 0.0,
            error_handling_added: 0.0,
        };
        assert_eq!(weights.score(&[], None), 0.0);
    }

    #[test]
    fn empty_inventory_does_not_count() {
        let weights = ConfidenceWeights::default();
        let state = json!({"title": "x", "available_selectors": {}});
        assert_eq!(weights.score(&[], Some(&state)), 0.5);
    }

    #[test]
    fn description_orders_by_impact_and_summarizes() {
        assert_eq!(describe_fix(&[]), "no obvious changes detected");

        let changes = vec![
            change(ChangeKind::CodeModification, ChangeImpact::Low),
            change(ChangeKind::WaitAdded, ChangeImpact::High),
        ];
        assert_eq!(describe_fix(&changes), "wait_added; code_modification");

        let many = vec![
            change(ChangeKind::CodeModification, ChangeImpact::Low),
            change(ChangeKind::WaitAdded, ChangeImpact::High),
            change(ChangeKind::AssertionUpdated, ChangeImpact::Medium),
            change(ChangeKind::RetryAdded, ChangeImpact::Medium),
        ];
        assert_eq!(describe_fix(&many), "wait_added; code_modification; and 2 others");

        let blank = vec![CodeChange::tagged(ChangeKind::RetryAdded, "", ChangeImpact::Low)];
        assert_eq!(describe_fix(&blank), "code fixed");
    }
}
