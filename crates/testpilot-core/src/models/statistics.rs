use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Statistics {
    pub total_plans: usize,
    pub total_codes: usize,
    pub total_executions: usize,
    pub successful_executions: usize,
    pub failed_executions: usize,
    pub total_heals: usize,
    pub successful_heals: usize,
    /// Percent of executions that succeeded.
    pub success_rate: f64,
    /// Percent of heal attempts that succeeded.
    pub heal_success_rate: f64,
}

/// `part / whole` as a percentage rounded to two decimals; 0 for an empty whole.
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 10_000.0).round() / 100.0
}
