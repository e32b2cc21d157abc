use anyhow::Result;
use colored::Colorize;
use std::sync::Arc;
use testpilot_core::AppCore;
use testpilot_core::services::{runtime, statistics};

use crate::output::{OutputFormat, json::print_json};

pub async fn stats(core: Arc<AppCore>, format: OutputFormat) -> Result<()> {
    let stats = statistics::get_statistics(&core).await?;
    if format.is_json() {
        return print_json(&stats);
    }

    println!("Plans:        {}", stats.total_plans);
    println!("Codes:        {}", stats.total_codes);
    println!(
        "Executions:   {} ({} success, {} failed, {:.2}% success)",
        stats.total_executions, stats.successful_executions, stats.failed_executions, stats.success_rate
    );
    println!(
        "Heals:        {} ({} success, {:.2}% success)",
        stats.total_heals, stats.successful_heals, stats.heal_success_rate
    );
    Ok(())
}

pub async fn doctor(core: Arc<AppCore>, format: OutputFormat) -> Result<()> {
    let probe = runtime::probe_runtime(&core).await?;
    if format.is_json() {
        return print_json(&probe);
    }

    let mark = |ok: bool| if ok { "ok".green() } else { "missing".red() };
    println!("node:         {} {}", mark(probe.node_available), probe.node_version.as_deref().unwrap_or(""));
    println!("npx:          {}", mark(probe.npx_available));
    println!("python:       {} {}", mark(probe.python_available), probe.python_version.as_deref().unwrap_or(""));
    println!("browser:      {} {}", mark(probe.local_browser.is_some()), probe.local_browser.as_deref().unwrap_or(""));
    println!("playwright:   {}", mark(probe.playwright_cache_detected));
    for note in &probe.notes {
        println!("  - {note}");
    }
    println!("\nReady: {}", if probe.ready { "yes".green() } else { "no".red() });
    Ok(())
}
