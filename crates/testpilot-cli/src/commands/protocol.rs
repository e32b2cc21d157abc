use anyhow::{Result, anyhow};
use comfy_table::{Cell, Table};
use std::sync::Arc;
use testpilot_browser::McpTransport;
use testpilot_core::AppCore;
use testpilot_core::models::ProtocolConfig;
use testpilot_core::services::protocol;

use crate::cli::ProtocolCommands;
use crate::commands::utils::{resolve_protocol, short_id};
use crate::output::table::print_table;
use crate::output::{OutputFormat, json::print_json};

pub async fn run(core: Arc<AppCore>, command: ProtocolCommands, format: OutputFormat) -> Result<()> {
    match command {
        ProtocolCommands::List => {
            let configs = protocol::list_configs(&core).await?;
            if format.is_json() {
                return print_json(&configs);
            }

            let mut table = Table::new();
            table.set_header(vec!["ID", "Name", "Transport", "Endpoint", "Enabled"]);
            for config in &configs {
                let endpoint = match config.transport {
                    McpTransport::StreamableHttp => config.url.clone().unwrap_or_default(),
                    McpTransport::Stdio => {
                        let mut parts = vec![config.command.clone().unwrap_or_default()];
                        parts.extend(config.args.iter().cloned());
                        parts.join(" ")
                    }
                };
                table.add_row(vec![
                    Cell::new(short_id(&config.id)),
                    Cell::new(&config.name),
                    Cell::new(config.transport.as_str()),
                    Cell::new(endpoint),
                    Cell::new(config.enabled),
                ]);
            }
            print_table(table)
        }
        ProtocolCommands::Add {
            name,
            url,
            command,
            args,
            headers,
            disabled,
        } => {
            let mut config = ProtocolConfig::streamable_http(name, url.unwrap_or_default());
            if command.is_some() {
                config.transport = McpTransport::Stdio;
                config.url = None;
                config.command = command;
                config.args = args;
            }
            for header in headers {
                let (key, value) = parse_header(&header)?;
                config.headers.insert(key, value);
            }
            config.enabled = !disabled;

            let created = protocol::create_config(&core, config).await?;
            if format.is_json() {
                return print_json(&created);
            }
            println!("Protocol config created: {} ({})", created.name, created.id);
            Ok(())
        }
        ProtocolCommands::Test { id } => {
            let id = resolve_protocol(&core, Some(&id))?.unwrap_or(id);
            let tools = protocol::test_connection(&core, &id).await?;
            if format.is_json() {
                return print_json(&tools);
            }

            let mut table = Table::new();
            table.set_header(vec!["Tool", "Description"]);
            for tool in &tools {
                table.add_row(vec![
                    Cell::new(&tool.name),
                    Cell::new(tool.description.as_deref().unwrap_or("")),
                ]);
            }
            print_table(table)?;
            println!("{} tools available", tools.len());
            Ok(())
        }
        ProtocolCommands::Delete { id } => {
            let id = resolve_protocol(&core, Some(&id))?.unwrap_or(id);
            protocol::delete_config(&core, &id).await?;
            if format.is_json() {
                return print_json(&serde_json::json!({ "deleted": id }));
            }
            println!("Protocol config deleted: {id}");
            Ok(())
        }
    }
}

fn parse_header(input: &str) -> Result<(String, String)> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| anyhow!("Header must be KEY=VALUE, got '{input}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("Header name must not be empty"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_pairs_split_on_first_equals() {
        assert_eq!(
            parse_header("Authorization=Bearer a=b").unwrap(),
            ("Authorization".to_string(), "Bearer a=b".to_string())
        );
        assert!(parse_header("no-separator").is_err());
        assert!(parse_header("=value").is_err());
    }
}
