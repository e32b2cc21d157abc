use anyhow::Result;
use comfy_table::{Cell, Table};
use std::sync::Arc;
use testpilot_core::AppCore;
use testpilot_core::models::{HealRecord, HealStatus};
use testpilot_core::services::{HealRequest, heals};
use testpilot_core::storage::HealFilter;

use crate::cli::{HealArgs, HealCommands};
use crate::commands::utils::{format_time, parse_status, preview_text, short_id};
use crate::output::table::print_page;
use crate::output::{OutputFormat, json::print_json};

pub async fn heal(core: Arc<AppCore>, args: HealArgs, format: OutputFormat) -> Result<()> {
    let mut request = HealRequest::new(args.execution_id);
    request.llm_config_id = args.llm;

    let result = heals::heal(&core, request).await?;

    if format.is_json() {
        return print_json(&result);
    }
    print_record(&result.record);
    if let Some(fixed) = &result.fixed_code {
        println!("\nRun the fixed script with:\n  testpilot execute {}", fixed.id);
    }
    Ok(())
}

pub async fn run(core: Arc<AppCore>, command: HealCommands, format: OutputFormat) -> Result<()> {
    match command {
        HealCommands::List {
            execution,
            status,
            page,
        } => {
            let filter = HealFilter {
                execution_id: execution,
                status: status.as_deref().map(parse_status::<HealStatus>).transpose()?,
            };
            let listing = heals::list_records(&core, &filter, page.page, page.page_size).await?;
            if format.is_json() {
                return print_json(&listing);
            }

            let mut table = Table::new();
            table.set_header(vec!["ID", "Execution", "Status", "Confidence", "Fix", "Created"]);
            for record in &listing.items {
                table.add_row(vec![
                    Cell::new(short_id(&record.id)),
                    Cell::new(short_id(&record.execution_id)),
                    Cell::new(record.status.as_str()),
                    Cell::new(format!("{:.2}", record.confidence)),
                    Cell::new(preview_text(&record.fix_description, 40)),
                    Cell::new(format_time(Some(record.created_at))),
                ]);
            }
            print_page(table, &listing)
        }
        HealCommands::Show { id } => {
            let record = heals::get_record(&core, &id).await?;
            if format.is_json() {
                return print_json(&record);
            }
            print_record(&record);
            Ok(())
        }
    }
}

fn print_record(record: &HealRecord) {
    println!("ID:          {}", record.id);
    println!("Execution:   {}", record.execution_id);
    println!("Original:    {}", record.original_code_id);
    println!("Fixed:       {}", record.fixed_code_id.as_deref().unwrap_or("-"));
    println!("Status:      {}", record.status.as_str());
    println!("Confidence:  {:.2}", record.confidence);
    if !record.fix_description.is_empty() {
        println!("Fix:         {}", record.fix_description);
    }
    for change in &record.changes {
        println!("  - [{}] {}", change.kind.as_str(), change.description);
    }
    if !record.error_analysis.is_empty() {
        println!("\nAnalysis:\n{}", record.error_analysis);
    }
}
