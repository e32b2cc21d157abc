use anyhow::Result;
use comfy_table::{Cell, Table};
use std::sync::Arc;
use testpilot_browser::ScriptLanguage;
use testpilot_core::AppCore;
use testpilot_core::models::{CodeStatus, GeneratedCode};
use testpilot_core::services::{GenerateRequest, codes};
use testpilot_core::storage::CodeFilter;

use crate::cli::{CodeCommands, GenerateArgs};
use crate::commands::utils::{format_time, parse_status, short_id};
use crate::config::CliConfig;
use crate::output::table::print_page;
use crate::output::{OutputFormat, json::print_json};

pub async fn generate(
    core: Arc<AppCore>,
    args: GenerateArgs,
    config: &CliConfig,
    format: OutputFormat,
) -> Result<()> {
    let language = args
        .language
        .as_deref()
        .map(ScriptLanguage::from_tag)
        .unwrap_or_else(|| config.language());
    let mut request = GenerateRequest::new(args.plan_id, language);
    request.framework = args.framework;
    request.llm_config_id = args.llm;

    let code = codes::generate(&core, request).await?;

    if format.is_json() {
        return print_json(&code);
    }
    print_code(&code, false);
    Ok(())
}

pub async fn run(core: Arc<AppCore>, command: CodeCommands, format: OutputFormat) -> Result<()> {
    match command {
        CodeCommands::List {
            plan,
            status,
            language,
            page,
        } => {
            let filter = CodeFilter {
                plan_id: plan,
                status: status.as_deref().map(parse_status::<CodeStatus>).transpose()?,
                language: language.as_deref().map(ScriptLanguage::from_tag),
            };
            let listing = codes::list_codes(&core, &filter, page.page, page.page_size).await?;
            if format.is_json() {
                return print_json(&listing);
            }

            let mut table = Table::new();
            table.set_header(vec!["ID", "Plan", "Language", "Status", "Enhanced", "Created"]);
            for code in &listing.items {
                table.add_row(vec![
                    Cell::new(short_id(&code.id)),
                    Cell::new(short_id(&code.plan_id)),
                    Cell::new(code.language.as_str()),
                    Cell::new(code.status.as_str()),
                    Cell::new(if code.enhanced { "yes" } else { "no" }),
                    Cell::new(format_time(Some(code.created_at))),
                ]);
            }
            print_page(table, &listing)
        }
        CodeCommands::Show { id, raw } => {
            let code = codes::get_code(&core, &id).await?;
            if format.is_json() {
                return print_json(&code);
            }
            print_code(&code, raw);
            Ok(())
        }
        CodeCommands::Delete { id } => {
            codes::delete_code(&core, &id).await?;
            if format.is_json() {
                return print_json(&serde_json::json!({ "deleted": id }));
            }
            println!("Code deleted: {id}");
            Ok(())
        }
    }
}

fn print_code(code: &GeneratedCode, raw: bool) {
    if raw {
        println!("{}", code.code);
        return;
    }
    println!("ID:          {}", code.id);
    println!("Plan:        {}", code.plan_id);
    println!("Framework:   {}", code.framework);
    println!("Language:    {}", code.language.as_str());
    println!("Status:      {}", code.status.as_str());
    println!("Enhanced:    {}", code.enhanced);
    if let Some(error) = &code.error_message {
        println!("Error:       {error}");
    }
    if !code.code.is_empty() {
        println!("\n{}", code.code);
    }
    if let Some(config) = &code.config {
        println!("\nConfig:\n{config}");
    }
}
