mod cli;
mod commands;
mod completions;
mod config;
mod error;
mod output;
mod setup;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use testpilot_core::paths;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error::handle_error(err);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        completions::generate_completions(shell);
        return Ok(());
    }

    let config = config::CliConfig::load();
    config.apply_api_key_env();

    // Always log to file; --verbose mirrors to stderr
    let log_dir = paths::ensure_log_dir()?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "testpilot.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let stderr_layer = cli
        .verbose
        .then(|| fmt::layer().with_writer(std::io::stderr).with_target(false));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false)
                .with_level(true),
        )
        .with(stderr_layer)
        .init();

    let core = setup::prepare_core(cli.db_path.clone(), &config).await?;
    commands::dispatch(core, cli.command, &config, cli.format).await
}
