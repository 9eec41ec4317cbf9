//! `clipforge plan` — Print the stage layout for a request.

use clipforge_core::models::{WorkflowPlan, WorkflowRequest};
use clipforge_core::state::AppState;

use super::print_json;

pub fn build(
    state: &AppState,
    prompt: &str,
    mode: Option<&str>,
    platforms: &[String],
) -> Result<WorkflowPlan, String> {
    let request = WorkflowRequest::parse(prompt, mode, platforms, Default::default())
        .map_err(|e| e.to_string())?;
    state.engine.plan(&request).map_err(|e| e.to_string())
}

pub fn run(
    state: &AppState,
    prompt: &str,
    mode: Option<&str>,
    platforms: &[String],
) -> Result<(), String> {
    let plan = build(state, prompt, mode, platforms)?;
    let stages: Vec<serde_json::Value> = plan
        .stages
        .iter()
        .map(|stage| {
            serde_json::json!({
                "index": stage.index,
                "agents": stage.tasks.iter().map(|t| t.agent_type.as_str()).collect::<Vec<_>>(),
            })
        })
        .collect();

    print_json(&serde_json::json!({
        "mode": plan.mode,
        "stages": stages,
    }));
    Ok(())
}
