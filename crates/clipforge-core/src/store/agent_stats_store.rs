use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::ServerError;
use crate::models::{AgentResult, AgentType, ResultStatus};

/// Lifetime run counters for one agent kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStats {
    pub agent_type: AgentType,
    pub total_runs: u64,
    pub successes: u64,
    pub failures: u64,
    pub skips: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct AgentStatsStore {
    db: Database,
}

impl AgentStatsStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn record(&self, result: &AgentResult) -> Result<(), ServerError> {
        let (success, failure, skip) = match result.status {
            ResultStatus::Success => (1, 0, 0),
            ResultStatus::Failed => (0, 1, 0),
            ResultStatus::Skipped => (0, 0, 1),
        };
        let agent_type = result.agent_type.as_str();
        let status = result.status.as_str();
        let error = result.error.clone();
        let now = Utc::now().timestamp_millis();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO agent_stats (agent_type, total_runs, successes, failures, skips, last_status, last_error, last_run_at)
                     VALUES (?1, 1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(agent_type) DO UPDATE SET
                       total_runs = total_runs + 1,
                       successes = successes + excluded.successes,
                       failures = failures + excluded.failures,
                       skips = skips + excluded.skips,
                       last_status = excluded.last_status,
                       last_error = excluded.last_error,
                       last_run_at = excluded.last_run_at",
                    rusqlite::params![agent_type, success, failure, skip, status, error, now],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, agent_type: AgentType) -> Result<Option<AgentStats>, ServerError> {
        let kind = agent_type.as_str();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT agent_type, total_runs, successes, failures, skips, last_status, last_error, last_run_at
                     FROM agent_stats WHERE agent_type = ?1",
                )?;
                stmt.query_row(rusqlite::params![kind], |row| Ok(row_to_stats(row)))
                    .optional()
                    .map(Option::flatten)
            })
            .await
    }

    pub async fn list(&self) -> Result<Vec<AgentStats>, ServerError> {
        let mut stats: Vec<AgentStats> = self
            .db
            .with_conn_async(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT agent_type, total_runs, successes, failures, skips, last_status, last_error, last_run_at
                     FROM agent_stats",
                )?;
                let rows = stmt
                    .query_map([], |row| Ok(row_to_stats(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows.into_iter().flatten().collect())
            })
            .await?;
        stats.sort_by_key(|s| s.agent_type);
        Ok(stats)
    }
}

/// Rows for kinds this build doesn't know are skipped.
fn row_to_stats(row: &Row<'_>) -> Option<AgentStats> {
    let agent_type = AgentType::from_str(&row.get::<_, String>(0).unwrap_or_default())?;
    let last_run_ms: Option<i64> = row.get(7).unwrap_or(None);
    Some(AgentStats {
        agent_type,
        total_runs: row.get::<_, i64>(1).unwrap_or(0) as u64,
        successes: row.get::<_, i64>(2).unwrap_or(0) as u64,
        failures: row.get::<_, i64>(3).unwrap_or(0) as u64,
        skips: row.get::<_, i64>(4).unwrap_or(0) as u64,
        last_status: row.get(5).unwrap_or(None),
        last_error: row.get(6).unwrap_or(None),
        last_run_at: last_run_ms.and_then(chrono::DateTime::from_timestamp_millis),
    })
}
