use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Output format for CLI commands
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

#[derive(Parser)]
#[command(name = "testpilot")]
#[command(version, about = "TestPilot - explore, generate, run and self-heal browser tests")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (defaults to ~/.testpilot/testpilot.db)
    #[arg(long, global = true, env = "TESTPILOT_DB_PATH")]
    pub db_path: Option<String>,

    /// Mirror debug logs to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Explore a URL and plan test scenarios
    Explore(ExploreArgs),

    /// Generate a test script from a plan
    Generate(GenerateArgs),

    /// Run a generated script
    Execute(ExecuteArgs),

    /// Self-heal a failed execution
    Heal(HealArgs),

    /// Test plans
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },

    /// Generated scripts
    Code {
        #[command(subcommand)]
        command: CodeCommands,
    },

    /// Executions and their step traces
    Execution {
        #[command(subcommand)]
        command: ExecutionCommands,
    },

    /// Heal records
    Heals {
        #[command(subcommand)]
        command: HealCommands,
    },

    /// Text-completion client configs
    Llm {
        #[command(subcommand)]
        command: LlmCommands,
    },

    /// Browser protocol server configs
    Protocol {
        #[command(subcommand)]
        command: ProtocolCommands,
    },

    /// Totals and success rates
    Stats,

    /// Check node, python and browser availability for script runs
    Doctor,
}

#[derive(Args)]
pub struct ExploreArgs {
    /// Target URL
    pub url: String,

    /// LLM config id (defaults to the default config, then environment keys)
    #[arg(long)]
    pub llm: Option<String>,

    /// Protocol server config id or name
    #[arg(long)]
    pub protocol: Option<String>,

    /// Exploration depth
    #[arg(long, default_value_t = 2)]
    pub max_depth: u32,

    /// Browser session budget in seconds
    #[arg(long, default_value_t = 300)]
    pub timeout: u64,

    /// Extra requirements for the planner
    #[arg(short, long)]
    pub requirements: Option<String>,
}

#[derive(Args)]
pub struct GenerateArgs {
    /// Plan id
    pub plan_id: String,

    /// typescript, javascript or python
    #[arg(short, long)]
    pub language: Option<String>,

    #[arg(long, default_value = "playwright")]
    pub framework: String,

    #[arg(long)]
    pub llm: Option<String>,
}

#[derive(Args)]
pub struct ExecuteArgs {
    /// Generated code id
    pub code_id: String,

    #[arg(short, long, default_value = "chromium")]
    pub browser: String,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Protocol server config id or name
    #[arg(long)]
    pub protocol: Option<String>,
}

#[derive(Args)]
pub struct HealArgs {
    /// Failed execution id
    pub execution_id: String,

    #[arg(long)]
    pub llm: Option<String>,
}

#[derive(Args, Clone, Copy)]
pub struct PageArgs {
    #[arg(long, default_value_t = 1)]
    pub page: usize,

    #[arg(long, default_value_t = 20)]
    pub page_size: usize,
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// List plans, newest first
    List {
        #[arg(long)]
        status: Option<String>,
        /// Substring of the target URL
        #[arg(long)]
        url: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },

    /// Show a plan with its scenarios
    Show { id: String },

    /// Delete a plan
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum CodeCommands {
    /// List generated scripts
    List {
        #[arg(long)]
        plan: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        language: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },

    /// Show a generated script
    Show {
        id: String,
        /// Print only the script body
        #[arg(long)]
        raw: bool,
    },

    /// Delete a generated script
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum ExecutionCommands {
    /// List executions
    List {
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },

    /// Show an execution
    Show { id: String },

    /// Show the step trace of an execution
    Steps { id: String },

    /// Delete an execution
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum HealCommands {
    /// List heal records
    List {
        #[arg(long)]
        execution: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },

    /// Show a heal record
    Show { id: String },
}

#[derive(Subcommand)]
pub enum LlmCommands {
    /// List LLM configs
    List,

    /// Add an LLM config
    Add {
        name: String,
        /// openai or anthropic
        #[arg(long, default_value = "openai")]
        provider: String,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
        /// Environment variable holding the API key
        #[arg(long)]
        api_key_env: Option<String>,
        /// Make this the default config
        #[arg(long)]
        default: bool,
    },

    /// Make a config the default
    SetDefault { id: String },

    /// Delete an LLM config
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum ProtocolCommands {
    /// List protocol server configs
    List,

    /// Add a protocol server config
    Add {
        name: String,
        /// Streamable HTTP endpoint
        #[arg(long, conflicts_with = "command")]
        url: Option<String>,
        /// Stdio server command
        #[arg(long)]
        command: Option<String>,
        /// Stdio server arguments
        #[arg(long = "arg")]
        args: Vec<String>,
        /// Extra header as KEY=VALUE
        #[arg(long = "header")]
        headers: Vec<String>,
        /// Store the config disabled
        #[arg(long)]
        disabled: bool,
    },

    /// Connect and list the server's tools
    Test { id: String },

    /// Delete a protocol server config
    Delete { id: String },
}
