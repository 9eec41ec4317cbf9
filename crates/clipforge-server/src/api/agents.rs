use axum::{extract::State, routing::get, Json, Router};

use clipforge_core::{AppState, ServerError};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_agents))
}

/// Registered agents with their dispatch policy and lifetime run counters.
async fn list_agents(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ServerError> {
    let stats = state.agent_stats_store.list().await?;
    let agents: Vec<serde_json::Value> = state
        .orchestrator
        .describe()
        .into_iter()
        .map(|agent| {
            let agent_stats = stats.iter().find(|s| s.agent_type == agent.agent_type);
            serde_json::json!({
                "agentType": agent.agent_type,
                "name": agent.name,
                "provider": agent.provider,
                "timeoutSecs": agent.timeout_secs,
                "maxRetries": agent.max_retries,
                "stats": agent_stats,
            })
        })
        .collect();

    Ok(Json(serde_json::json!({ "agents": agents })))
}
