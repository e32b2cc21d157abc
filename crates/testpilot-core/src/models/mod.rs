pub mod code;
pub mod config;
pub mod execution;
pub mod heal;
pub mod plan;
pub mod statistics;

pub use code::{CodeStatus, DEFAULT_FRAMEWORK, GeneratedCode};
pub use config::{LlmConfig, ProtocolConfig, default_key_env, default_model};
pub use execution::{
    DEFAULT_BROWSER, Execution, ExecutionStatus, ExecutionSteps, StepRecord, StepStatus,
};
pub use heal::{ChangeImpact, ChangeKind, CodeChange, HealRecord, HealStatus};
pub use plan::{
    DEFAULT_EXPLORE_TIMEOUT_SECS, DEFAULT_MAX_DEPTH, DEFAULT_SEED_FILE, ElementCounts,
    ExplorationMethod, ExplorationResult, ExplorationStep, PlanStatus, Priority, Scenario,
    TestPlan,
};
pub use statistics::{Statistics, percentage};
