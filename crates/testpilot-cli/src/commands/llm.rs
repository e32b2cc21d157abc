use anyhow::Result;
use comfy_table::{Cell, Table};
use std::str::FromStr;
use std::sync::Arc;
use testpilot_ai::LlmProvider;
use testpilot_core::AppCore;
use testpilot_core::models::LlmConfig;
use testpilot_core::services::llm;

use crate::cli::LlmCommands;
use crate::commands::utils::short_id;
use crate::output::table::print_table;
use crate::output::{OutputFormat, json::print_json};

pub async fn run(core: Arc<AppCore>, command: LlmCommands, format: OutputFormat) -> Result<()> {
    match command {
        LlmCommands::List => {
            let configs = llm::list_configs(&core).await?;
            if format.is_json() {
                return print_json(&configs);
            }

            let mut table = Table::new();
            table.set_header(vec!["ID", "Name", "Provider", "Model", "Key env", "Default"]);
            for config in &configs {
                table.add_row(vec![
                    Cell::new(short_id(&config.id)),
                    Cell::new(&config.name),
                    Cell::new(config.provider.as_str()),
                    Cell::new(&config.model),
                    Cell::new(config.key_env()),
                    Cell::new(if config.is_default { "*" } else { "" }),
                ]);
            }
            print_table(table)
        }
        LlmCommands::Add {
            name,
            provider,
            model,
            base_url,
            api_key_env,
            default,
        } => {
            let provider = LlmProvider::from_str(&provider)?;
            let mut config = LlmConfig::new(name, provider, model.unwrap_or_default());
            config.base_url = base_url;
            config.api_key_env = api_key_env;
            config.is_default = default;
            let created = llm::create_config(&core, config).await?;
            if format.is_json() {
                return print_json(&created);
            }
            println!("LLM config created: {} ({})", created.name, created.id);
            Ok(())
        }
        LlmCommands::SetDefault { id } => {
            let config = llm::set_default(&core, &id).await?;
            if format.is_json() {
                return print_json(&config);
            }
            println!("Default LLM config: {} ({})", config.name, config.id);
            Ok(())
        }
        LlmCommands::Delete { id } => {
            llm::delete_config(&core, &id).await?;
            if format.is_json() {
                return print_json(&serde_json::json!({ "deleted": id }));
            }
            println!("LLM config deleted: {id}");
            Ok(())
        }
    }
}
