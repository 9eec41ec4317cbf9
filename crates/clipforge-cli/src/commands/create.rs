//! `clipforge create` — Run a workflow in the foreground.

use clipforge_core::models::{WorkflowRequest, WorkflowResult, WorkflowStatus};
use clipforge_core::state::AppState;

use super::{parse_params, print_json};

/// Build, validate and run a workflow, returning its final result.
pub async fn execute(
    state: &AppState,
    prompt: &str,
    mode: Option<&str>,
    platforms: &[String],
    params: &[String],
) -> Result<WorkflowResult, String> {
    let parameters = parse_params(params)?;
    let request =
        WorkflowRequest::parse(prompt, mode, platforms, parameters).map_err(|e| e.to_string())?;
    state.engine.run(request).await.map_err(|e| e.to_string())
}

pub async fn run(
    state: &AppState,
    prompt: &str,
    mode: Option<&str>,
    platforms: &[String],
    params: &[String],
) -> Result<(), String> {
    tracing::info!(
        "[CLI] Running workflow ({} mode) for {} platform(s)",
        mode.unwrap_or("hybrid"),
        platforms.len()
    );
    let result = execute(state, prompt, mode, platforms, params).await?;
    tracing::info!(
        "[CLI] Workflow {} finished: {}",
        result.workflow_id,
        result.status.as_str()
    );
    print_json(&serde_json::to_value(&result).map_err(|e| e.to_string())?);

    match result.status {
        WorkflowStatus::Failed => Err(format!(
            "Workflow {} failed: {}",
            result.workflow_id,
            result.errors.join("; ")
        )),
        WorkflowStatus::Partial => {
            eprintln!(
                "Workflow {} finished with {} error(s)",
                result.workflow_id,
                result.errors.len()
            );
            Ok(())
        }
        _ => Ok(()),
    }
}
