use anyhow::Result;
use colored::Colorize;
use comfy_table::{Cell, Table};
use std::sync::Arc;
use testpilot_core::AppCore;
use testpilot_core::models::{PlanStatus, TestPlan};
use testpilot_core::services::{ExploreRequest, plans};
use testpilot_core::storage::PlanFilter;

use crate::cli::{ExploreArgs, PlanCommands};
use crate::commands::utils::{format_time, parse_status, preview_text, resolve_protocol, short_id};
use crate::output::table::print_page;
use crate::output::{OutputFormat, json::print_json};

pub async fn explore(core: Arc<AppCore>, args: ExploreArgs, format: OutputFormat) -> Result<()> {
    let mut request = ExploreRequest::new(args.url);
    request.llm_config_id = args.llm;
    request.protocol_config_id = resolve_protocol(&core, args.protocol.as_deref())?;
    request.max_depth = args.max_depth;
    request.timeout_secs = args.timeout;
    request.requirements = args.requirements;

    let plan = plans::explore(&core, request).await?;

    if format.is_json() {
        return print_json(&plan);
    }
    print_plan(&plan);
    Ok(())
}

pub async fn run(core: Arc<AppCore>, command: PlanCommands, format: OutputFormat) -> Result<()> {
    match command {
        PlanCommands::List { status, url, page } => {
            let filter = PlanFilter {
                status: status.as_deref().map(parse_status::<PlanStatus>).transpose()?,
                url_contains: url,
            };
            let listing = plans::list_plans(&core, &filter, page.page, page.page_size).await?;
            if format.is_json() {
                return print_json(&listing);
            }

            let mut table = Table::new();
            table.set_header(vec!["ID", "URL", "Status", "Scenarios", "Created"]);
            for plan in &listing.items {
                table.add_row(vec![
                    Cell::new(short_id(&plan.id)),
                    Cell::new(preview_text(&plan.url, 48)),
                    Cell::new(plan.status.as_str()),
                    Cell::new(plan.test_scenarios.len()),
                    Cell::new(format_time(Some(plan.created_at))),
                ]);
            }
            print_page(table, &listing)
        }
        PlanCommands::Show { id } => {
            let plan = plans::get_plan(&core, &id).await?;
            if format.is_json() {
                return print_json(&plan);
            }
            print_plan(&plan);
            Ok(())
        }
        PlanCommands::Delete { id } => {
            plans::delete_plan(&core, &id).await?;
            if format.is_json() {
                return print_json(&serde_json::json!({ "deleted": id }));
            }
            println!("Plan deleted: {id}");
            Ok(())
        }
    }
}

fn print_plan(plan: &TestPlan) {
    let status = match plan.status {
        PlanStatus::Completed => plan.status.as_str().green(),
        PlanStatus::Failed => plan.status.as_str().red(),
        _ => plan.status.as_str().yellow(),
    };
    println!("ID:          {}", plan.id);
    println!("URL:         {}", plan.url);
    println!("Status:      {status}");
    if let Some(result) = &plan.exploration_result {
        println!("Method:      {}", result.method.as_str());
    }
    println!("Created:     {}", format_time(Some(plan.created_at)));
    if let Some(error) = &plan.error_message {
        println!("Error:       {error}");
    }

    for (index, scenario) in plan.test_scenarios.iter().enumerate() {
        println!(
            "\n{}. {} [{}]",
            index + 1,
            scenario.name.bold(),
            scenario.priority.as_str()
        );
        if !scenario.description.is_empty() {
            println!("   {}", scenario.description);
        }
        for step in &scenario.steps {
            println!("   - {step}");
        }
        if !scenario.expected_result.is_empty() {
            println!("   => {}", scenario.expected_result);
        }
    }
}
