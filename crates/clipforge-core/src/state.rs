//! Shared application state for the HTTP server and the CLI.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::Database;
use crate::orchestration::Orchestrator;
use crate::store::{AgentStatsStore, WorkflowStore};
use crate::workflow::{WorkflowEngine, WorkflowTracker};

/// Shared state accessible by all API handlers and CLI commands.
pub struct AppStateInner {
    pub db: Database,
    pub config: Arc<AppConfig>,
    pub workflow_store: WorkflowStore,
    pub agent_stats_store: AgentStatsStore,
    pub orchestrator: Arc<Orchestrator>,
    pub tracker: Arc<WorkflowTracker>,
    pub engine: WorkflowEngine,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    /// Production wiring: the ten HTTP-backed agents built from config.
    pub fn new(db: Database, config: AppConfig) -> Self {
        let orchestrator = Orchestrator::from_config(&config);
        Self::with_orchestrator(db, config, orchestrator)
    }

    /// Wire state around a caller-supplied orchestrator (custom or fake agents).
    pub fn with_orchestrator(db: Database, config: AppConfig, orchestrator: Orchestrator) -> Self {
        let workflow_store = WorkflowStore::new(db.clone());
        let agent_stats_store = AgentStatsStore::new(db.clone());
        let orchestrator = Arc::new(orchestrator);
        let tracker = Arc::new(WorkflowTracker::new());
        let engine = WorkflowEngine::new(orchestrator.clone(), config.defaults.clone())
            .with_tracker(tracker.clone())
            .with_workflow_store(workflow_store.clone())
            .with_stats_store(agent_stats_store.clone());

        Self {
            db,
            config: Arc::new(config),
            workflow_store,
            agent_stats_store,
            orchestrator,
            tracker,
            engine,
        }
    }
}
