use colored::Colorize;

pub fn handle_error(err: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    let msg = format!("{err:#}").to_lowercase();

    if msg.contains("api key is required") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Export a provider key, for example:");
        eprintln!("  {} export OPENAI_API_KEY=<value>", "$".dimmed());
        eprintln!("  or add it under [api_keys] in ~/.config/testpilot/config.toml");
    }

    if msg.contains("test plan") && msg.contains("not found") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  List available plans with:");
        eprintln!("  {} testpilot plan list", "$".dimmed());
    }

    if msg.contains("only failed executions can be healed") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Find failed executions with:");
        eprintln!("  {} testpilot execution list --status failed", "$".dimmed());
    }

    if msg.contains("connection refused") || msg.contains("network") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Check that the protocol server is running and reachable.");
    }

    std::process::exit(1);
}
