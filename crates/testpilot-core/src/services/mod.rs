//! Phase operations and entity accessors over [`AppCore`](crate::AppCore).

pub mod codes;
pub mod executions;
pub mod heals;
pub mod llm;
pub mod plans;
pub mod protocol;
pub mod runtime;
pub mod statistics;

pub use codes::GenerateRequest;
pub use executions::ExecuteRequest;
pub use heals::{HealRequest, HealResult};
pub use plans::ExploreRequest;
