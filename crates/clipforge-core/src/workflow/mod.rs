//! Workflow planning and execution.
//!
//! - [`plan`]: lays ten agent tasks out into stages for an execution mode
//! - [`engine`]: drives a plan stage by stage through the orchestrator
//! - [`tracker`]: shared registry of in-flight workflow snapshots

pub mod engine;
pub mod plan;
pub mod tracker;

pub use engine::{PreparedWorkflow, WorkflowEngine};
pub use plan::{build_plan, tier_of, waves};
pub use tracker::{CancelFlag, TrackedWorkflow, WorkflowTracker};
