use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use clipforge_core::models::{WorkflowRequest, WorkflowResult};
use clipforge_core::{AppState, ServerError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_workflow))
        .route("/workflows", get(list_workflows))
        .route("/workflow/{id}", get(get_workflow))
        .route("/workflow/{id}/cancel", post(cancel_workflow))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateWorkflowRequest {
    #[serde(default)]
    prompt: String,
    mode: Option<String>,
    #[serde(default)]
    platforms: Vec<String>,
    #[serde(default)]
    parameters: BTreeMap<String, serde_json::Value>,
}

/// Validate and plan synchronously, then run on a background task.
async fn create_workflow(
    State(state): State<AppState>,
    Json(body): Json<CreateWorkflowRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let request = WorkflowRequest::parse(
        &body.prompt,
        body.mode.as_deref(),
        &body.platforms,
        body.parameters,
    )?;
    let prepared = state.engine.prepare(request).await?;
    let workflow_id = prepared.workflow_id.clone();

    tracing::info!(
        "[API] Workflow {} accepted ({} tasks in {} stage(s))",
        workflow_id,
        prepared.plan.task_count(),
        prepared.plan.stages.len()
    );

    let engine = state.engine.clone();
    tokio::spawn(async move {
        engine.execute(prepared).await;
    });

    Ok(Json(serde_json::json!({
        "workflowId": workflow_id,
        "status": "running",
    })))
}

async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowResult>, ServerError> {
    if let Some(snapshot) = state.tracker.get(&id).await {
        return Ok(Json(snapshot));
    }
    state
        .workflow_store
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("Workflow {} not found", id)))
}

#[derive(Debug, Deserialize)]
struct ListWorkflowsQuery {
    limit: Option<usize>,
}

async fn list_workflows(
    State(state): State<AppState>,
    Query(query): Query<ListWorkflowsQuery>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let mut workflows = state.workflow_store.list(limit).await?;

    // Workflows that haven't finished a stage yet only live in the tracker.
    for summary in state.tracker.list().await {
        if !workflows.iter().any(|w| w.workflow_id == summary.workflow_id) {
            workflows.push(summary);
        }
    }
    workflows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    workflows.truncate(limit);

    Ok(Json(serde_json::json!({ "workflows": workflows })))
}

/// `cancelled` is true only when the request will stop the run: a workflow
/// that already dispatched its final wave finishes normally and reports false.
async fn cancel_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let cancelled = state.tracker.cancel(&id).await;
    if !cancelled
        && state.tracker.get(&id).await.is_none()
        && state.workflow_store.get(&id).await?.is_none()
    {
        return Err(ServerError::NotFound(format!("Workflow {} not found", id)));
    }
    Ok(Json(serde_json::json!({ "cancelled": cancelled })))
}
