use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::agent::{AgentType, Dependency};

/// Output of an agent: artifact references and scalar values keyed by name.
///
/// A `BTreeMap` keeps serialization order stable across reads.
pub type AgentOutput = BTreeMap<String, serde_json::Value>;

/// A single unit of work for one agent. Immutable once planned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTask {
    pub id: String,
    pub agent_type: AgentType,
    pub input_prompt: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub depends_on: Vec<Dependency>,
    pub created_at: DateTime<Utc>,
}

impl AgentTask {
    pub fn new(
        agent_type: AgentType,
        input_prompt: String,
        parameters: BTreeMap<String, serde_json::Value>,
        depends_on: Vec<Dependency>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_type,
            input_prompt,
            parameters,
            depends_on,
            created_at: Utc::now(),
        }
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn param_f64(&self, key: &str) -> Option<f64> {
        self.parameters.get(key).and_then(|v| v.as_f64())
    }

    /// Read a list of strings, ignoring non-string members.
    pub fn param_list(&self, key: &str) -> Vec<String> {
        self.parameters
            .get(key)
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn hard_dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.depends_on.iter().filter(|d| d.kind.is_hard())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Failed,
    Skipped,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Why a task did not succeed. Drives the retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Required parameter missing or malformed; no external call was made.
    Validation,
    /// Network failure, 5xx or rate limiting.
    Transient,
    /// The per-call deadline elapsed.
    Timeout,
    /// Authoritative provider refusal (4xx, content policy).
    Rejected,
    /// A hard upstream dependency did not succeed.
    Dependency,
    /// The workflow was cancelled before this task was dispatched.
    Cancelled,
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient | Self::Timeout)
    }
}

/// The outcome of one `AgentTask`. Produced exactly once per task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResult {
    pub task_id: String,
    pub agent_type: AgentType,
    pub status: ResultStatus,
    #[serde(default)]
    pub output: AgentOutput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub duration_ms: u64,
    #[serde(default)]
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

impl AgentResult {
    /// A successful result. An empty output is not a success and is
    /// recorded as a rejected failure instead.
    pub fn success(task: &AgentTask, output: AgentOutput) -> Self {
        if output.is_empty() {
            return Self::failed(task, ErrorKind::Rejected, "agent returned empty output");
        }
        Self {
            task_id: task.id.clone(),
            agent_type: task.agent_type,
            status: ResultStatus::Success,
            output,
            error: None,
            error_kind: None,
            duration_ms: 0,
            attempts: 0,
            cost: None,
        }
    }

    pub fn failed(task: &AgentTask, kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            task_id: task.id.clone(),
            agent_type: task.agent_type,
            status: ResultStatus::Failed,
            output: AgentOutput::new(),
            error: Some(non_empty(error.into(), kind)),
            error_kind: Some(kind),
            duration_ms: 0,
            attempts: 0,
            cost: None,
        }
    }

    pub fn skipped(task: &AgentTask, kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self {
            task_id: task.id.clone(),
            agent_type: task.agent_type,
            status: ResultStatus::Skipped,
            output: AgentOutput::new(),
            error: Some(non_empty(reason.into(), kind)),
            error_kind: Some(kind),
            duration_ms: 0,
            attempts: 0,
            cost: None,
        }
    }

    pub fn with_cost(mut self, cost: Option<f64>) -> Self {
        self.cost = cost;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }

    /// Whether the orchestrator may try again.
    pub fn is_retryable(&self) -> bool {
        self.status == ResultStatus::Failed
            && self.error_kind.map(|k| k.is_retryable()).unwrap_or(false)
    }

    pub fn output_str(&self, key: &str) -> Option<&str> {
        self.output.get(key).and_then(|v| v.as_str())
    }
}

fn non_empty(message: String, kind: ErrorKind) -> String {
    if message.trim().is_empty() {
        format!("{:?}", kind).to_lowercase()
    } else {
        message
    }
}
