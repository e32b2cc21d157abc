pub mod code;
pub mod execution;
pub mod heal;
pub mod llm;
pub mod plan;
pub mod protocol;
pub mod stats;
pub mod utils;

use anyhow::Result;
use std::sync::Arc;
use testpilot_core::AppCore;

use crate::cli::{Commands, OutputFormat};
use crate::config::CliConfig;

pub async fn dispatch(
    core: Arc<AppCore>,
    command: Commands,
    config: &CliConfig,
    format: OutputFormat,
) -> Result<()> {
    match command {
        Commands::Explore(args) => plan::explore(core, args, format).await,
        Commands::Generate(args) => code::generate(core, args, config, format).await,
        Commands::Execute(args) => execution::execute(core, args, config, format).await,
        Commands::Heal(args) => heal::heal(core, args, format).await,
        Commands::Plan { command } => plan::run(core, command, format).await,
        Commands::Code { command } => code::run(core, command, format).await,
        Commands::Execution { command } => execution::run(core, command, format).await,
        Commands::Heals { command } => heal::run(core, command, format).await,
        Commands::Llm { command } => llm::run(core, command, format).await,
        Commands::Protocol { command } => protocol::run(core, command, format).await,
        Commands::Stats => stats::stats(core, format).await,
        Commands::Doctor => stats::doctor(core, format).await,
        Commands::Completions { .. } => Ok(()),
    }
}
