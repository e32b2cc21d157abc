use anyhow::Result;
use colored::Colorize;
use comfy_table::{Cell, Table};
use std::sync::Arc;
use testpilot_core::AppCore;
use testpilot_core::models::{Execution, ExecutionStatus, StepStatus};
use testpilot_core::services::{ExecuteRequest, executions};
use testpilot_core::storage::ExecutionFilter;

use crate::cli::{ExecuteArgs, ExecutionCommands};
use crate::commands::utils::{format_time, parse_status, preview_text, resolve_protocol, short_id};
use crate::config::CliConfig;
use crate::output::table::{print_page, print_table};
use crate::output::{OutputFormat, json::print_json};

pub async fn execute(
    core: Arc<AppCore>,
    args: ExecuteArgs,
    config: &CliConfig,
    format: OutputFormat,
) -> Result<()> {
    let mut request = ExecuteRequest::new(args.code_id);
    request.browser = args.browser;
    request.headless = !args.headed && config.headless();
    request.protocol_config_id = resolve_protocol(&core, args.protocol.as_deref())?;

    let execution = executions::execute(&core, request).await?;

    if format.is_json() {
        return print_json(&execution);
    }
    print_execution(&execution);
    Ok(())
}

pub async fn run(core: Arc<AppCore>, command: ExecutionCommands, format: OutputFormat) -> Result<()> {
    match command {
        ExecutionCommands::List { code, status, page } => {
            let filter = ExecutionFilter {
                code_id: code,
                status: status.as_deref().map(parse_status::<ExecutionStatus>).transpose()?,
            };
            let listing = executions::list_executions(&core, &filter, page.page, page.page_size).await?;
            if format.is_json() {
                return print_json(&listing);
            }

            let mut table = Table::new();
            table.set_header(vec!["ID", "Code", "Browser", "Backend", "Status", "Steps", "Duration", "Started"]);
            for execution in &listing.items {
                table.add_row(vec![
                    Cell::new(short_id(&execution.id)),
                    Cell::new(short_id(&execution.code_id)),
                    Cell::new(&execution.browser),
                    Cell::new(execution.backend.as_deref().unwrap_or("-")),
                    Cell::new(execution.status.as_str()),
                    Cell::new(execution.screenshots.len()),
                    Cell::new(format_duration(execution.duration)),
                    Cell::new(format_time(execution.started_at)),
                ]);
            }
            print_page(table, &listing)
        }
        ExecutionCommands::Show { id } => {
            let execution = executions::get_execution(&core, &id).await?;
            if format.is_json() {
                return print_json(&execution);
            }
            print_execution(&execution);
            Ok(())
        }
        ExecutionCommands::Steps { id } => {
            let steps = executions::get_steps(&core, &id).await?;
            if format.is_json() {
                return print_json(&steps);
            }

            let mut table = Table::new();
            table.set_header(vec!["#", "Action", "Description", "Status", "Duration", "Shots", "Error"]);
            for step in &steps.steps {
                let shots = [&step.screenshot_before, &step.screenshot_after]
                    .iter()
                    .filter(|shot| shot.is_some())
                    .count();
                table.add_row(vec![
                    Cell::new(step.step_number),
                    Cell::new(&step.action),
                    Cell::new(preview_text(&step.description, 40)),
                    Cell::new(match step.status {
                        StepStatus::Success => "success",
                        StepStatus::Failed => "failed",
                    }),
                    Cell::new(format!("{:.2}s", step.duration)),
                    Cell::new(shots),
                    Cell::new(preview_text(step.error_message.as_deref().unwrap_or(""), 40)),
                ]);
            }
            print_table(table)?;
            println!("{} steps, execution {}", steps.total_steps, steps.status.as_str());
            Ok(())
        }
        ExecutionCommands::Delete { id } => {
            executions::delete_execution(&core, &id).await?;
            if format.is_json() {
                return print_json(&serde_json::json!({ "deleted": id }));
            }
            println!("Execution deleted: {id}");
            Ok(())
        }
    }
}

fn format_duration(duration: Option<f64>) -> String {
    duration.map_or_else(|| "-".to_string(), |secs| format!("{secs:.2}s"))
}

fn print_execution(execution: &Execution) {
    let status = match execution.status {
        ExecutionStatus::Success => execution.status.as_str().green(),
        ExecutionStatus::Failed => execution.status.as_str().red(),
        _ => execution.status.as_str().yellow(),
    };
    println!("ID:          {}", execution.id);
    println!("Code:        {}", execution.code_id);
    println!("Browser:     {} (headless: {})", execution.browser, execution.headless);
    println!("Backend:     {}", execution.backend.as_deref().unwrap_or("-"));
    println!("Status:      {status}");
    println!("Duration:    {}", format_duration(execution.duration));
    println!("Steps:       {}", execution.screenshots.len());
    if let Some(code) = execution.exit_code {
        println!("Exit code:   {code}");
    }
    if !execution.stdout.is_empty() {
        println!("\n{}", execution.stdout);
    }
    if let Some(error) = &execution.error_message {
        println!("\n{} {error}", "Error:".red());
    }
}
