use chrono::Utc;
use rusqlite::{OptionalExtension, Row};

use crate::db::Database;
use crate::error::ServerError;
use crate::models::{ExecutionMode, WorkflowResult, WorkflowStatus, WorkflowSummary};

/// Persists workflow snapshots. The full `WorkflowResult` is stored as JSON;
/// status, mode and prompt are duplicated into columns for listing.
#[derive(Clone)]
pub struct WorkflowStore {
    db: Database,
}

impl WorkflowStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn save(&self, workflow: &WorkflowResult) -> Result<(), ServerError> {
        let snapshot = serde_json::to_string(workflow)
            .map_err(|e| ServerError::Internal(format!("Failed to serialize workflow: {}", e)))?;
        let id = workflow.workflow_id.clone();
        let status = workflow.status.as_str();
        let mode = workflow.mode.as_str();
        let prompt = workflow.prompt.clone();
        let created_at = workflow.created_at.timestamp_millis();
        let updated_at = workflow.updated_at.timestamp_millis();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO workflows (id, status, mode, prompt, snapshot, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(id) DO UPDATE SET
                       status = excluded.status,
                       mode = excluded.mode,
                       prompt = excluded.prompt,
                       snapshot = excluded.snapshot,
                       updated_at = excluded.updated_at",
                    rusqlite::params![id, status, mode, prompt, snapshot, created_at, updated_at],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, workflow_id: &str) -> Result<Option<WorkflowResult>, ServerError> {
        let id = workflow_id.to_string();
        let snapshot: Option<String> = self
            .db
            .with_conn_async(move |conn| {
                conn.query_row(
                    "SELECT snapshot FROM workflows WHERE id = ?1",
                    rusqlite::params![id],
                    |row| row.get(0),
                )
                .optional()
            })
            .await?;

        snapshot
            .map(|s| {
                serde_json::from_str(&s).map_err(|e| {
                    ServerError::Internal(format!(
                        "Corrupt snapshot for workflow {}: {}",
                        workflow_id, e
                    ))
                })
            })
            .transpose()
    }

    /// Most recently updated first.
    pub async fn list(&self, limit: usize) -> Result<Vec<WorkflowSummary>, ServerError> {
        let limit = limit as i64;
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, status, mode, prompt, created_at, updated_at
                     FROM workflows ORDER BY updated_at DESC LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![limit], |row| Ok(row_to_summary(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    pub async fn delete(&self, workflow_id: &str) -> Result<bool, ServerError> {
        let id = workflow_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let deleted =
                    conn.execute("DELETE FROM workflows WHERE id = ?1", rusqlite::params![id])?;
                Ok(deleted > 0)
            })
            .await
    }
}

fn row_to_summary(row: &Row<'_>) -> WorkflowSummary {
    let created_ms: i64 = row.get(4).unwrap_or(0);
    let updated_ms: i64 = row.get(5).unwrap_or(0);
    WorkflowSummary {
        workflow_id: row.get(0).unwrap_or_default(),
        status: WorkflowStatus::from_str(&row.get::<_, String>(1).unwrap_or_default())
            .unwrap_or(WorkflowStatus::Failed),
        mode: ExecutionMode::from_str(&row.get::<_, String>(2).unwrap_or_default())
            .unwrap_or_default(),
        prompt: row.get(3).unwrap_or_default(),
        created_at: chrono::DateTime::from_timestamp_millis(created_ms)
            .unwrap_or_else(Utc::now),
        updated_at: chrono::DateTime::from_timestamp_millis(updated_ms)
            .unwrap_or_else(Utc::now),
    }
}
