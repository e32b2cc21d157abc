use anyhow::{Result, anyhow};
use chrono::{DateTime, Local, Utc};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use testpilot_core::AppCore;

use crate::setup::DEFAULT_PROTOCOL_NAME;

pub fn format_time(time: Option<DateTime<Utc>>) -> String {
    match time {
        Some(time) => time.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}

pub fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

pub fn preview_text(input: &str, max_len: usize) -> String {
    if input.chars().count() <= max_len {
        return input.to_string();
    }

    let mut preview = input.chars().take(max_len).collect::<String>();
    preview.push('…');
    preview
}

/// Parse a lowercase status tag (`completed`, `failed`, ...) into a model enum.
pub fn parse_status<T: DeserializeOwned>(input: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(input.trim().to_lowercase()))
        .map_err(|_| anyhow!("Unknown status: {input}"))
}

/// Resolve a protocol config by id or name; falls back to the seeded default server.
pub fn resolve_protocol(core: &Arc<AppCore>, input: Option<&str>) -> Result<Option<String>> {
    let servers = core.storage.protocol_configs.list()?;
    match input {
        Some(wanted) => servers
            .iter()
            .find(|server| server.id == wanted || server.name == wanted)
            .map(|server| Some(server.id.clone()))
            .ok_or_else(|| anyhow!("Protocol config {wanted} not found")),
        None => Ok(servers
            .iter()
            .find(|server| server.name == DEFAULT_PROTOCOL_NAME && server.enabled)
            .map(|server| server.id.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testpilot_core::models::{ExecutionStatus, PlanStatus};

    #[test]
    fn status_tags_parse_case_insensitively() {
        assert_eq!(parse_status::<PlanStatus>("Completed").unwrap(), PlanStatus::Completed);
        assert_eq!(parse_status::<ExecutionStatus>("failed").unwrap(), ExecutionStatus::Failed);
        assert!(parse_status::<PlanStatus>("done").is_err());
    }

    #[test]
    fn preview_truncates_on_char_boundaries() {
        assert_eq!(preview_text("héllo", 10), "héllo");
        assert_eq!(preview_text("héllo wörld", 5), "héllo…");
    }
}
