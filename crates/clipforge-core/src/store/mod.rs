pub mod agent_stats_store;
pub mod workflow_store;

pub use agent_stats_store::{AgentStats, AgentStatsStore};
pub use workflow_store::WorkflowStore;
