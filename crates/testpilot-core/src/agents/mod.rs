//! Phase drivers: explore, generate, execute, heal.
//!
//! Each driver takes the entity in its non-terminal state and always leaves
//! it terminal. Persistence is the caller's concern.

pub mod completion;
pub mod executor;
pub mod generator;
pub mod healer;
pub mod planner;
pub mod prompts;
pub mod scoring;

pub use executor::ExecutionEngine;
pub use generator::{CodeGenerator, GeneratedScript};
pub use healer::Healer;
pub use planner::{Planner, default_scenarios, parse_scenarios, render_plan};
pub use scoring::{ConfidenceWeights, describe_fix};
