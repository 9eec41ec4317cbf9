pub mod agent;
pub mod task;
pub mod workflow;

pub use agent::*;
pub use task::*;
pub use workflow::*;
