//! `clipforge workflow` — Inspect stored workflow results.

use clipforge_core::state::AppState;

use super::print_json;

pub async fn get(state: &AppState, id: &str) -> Result<(), String> {
    let workflow = state
        .workflow_store
        .get(id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Workflow {} not found", id))?;
    print_json(&serde_json::to_value(&workflow).map_err(|e| e.to_string())?);
    Ok(())
}

pub async fn list(state: &AppState, limit: usize) -> Result<(), String> {
    let rows = state
        .workflow_store
        .list(limit)
        .await
        .map_err(|e| e.to_string())?;

    if rows.is_empty() {
        println!("No workflows yet.");
        return Ok(());
    }
    for row in rows {
        println!(
            "{}  {:<10} {:<10} {}  {}",
            row.workflow_id,
            row.status.as_str(),
            row.mode.as_str(),
            row.created_at.format("%Y-%m-%d %H:%M:%S"),
            row.prompt
        );
    }
    Ok(())
}

pub async fn delete(state: &AppState, id: &str) -> Result<(), String> {
    let removed = state
        .workflow_store
        .delete(id)
        .await
        .map_err(|e| e.to_string())?;
    if !removed {
        return Err(format!("Workflow {} not found", id));
    }
    tracing::info!("[CLI] Deleted workflow {}", id);
    println!("Deleted workflow {}", id);
    Ok(())
}
