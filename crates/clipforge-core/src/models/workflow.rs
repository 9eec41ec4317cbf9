use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::agent::AgentType;
use super::task::{AgentResult, AgentTask};
use crate::error::EngineError;

/// Social platforms a workflow can publish to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[serde(rename = "tiktok")]
    TikTok,
    Instagram,
    #[serde(rename = "youtube")]
    YouTube,
    Twitter,
    Facebook,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TikTok => "tiktok",
            Self::Instagram => "instagram",
            Self::YouTube => "youtube",
            Self::Twitter => "twitter",
            Self::Facebook => "facebook",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "tiktok" => Some(Self::TikTok),
            "instagram" => Some(Self::Instagram),
            "youtube" => Some(Self::YouTube),
            "twitter" | "x" => Some(Self::Twitter),
            "facebook" | "meta" => Some(Self::Facebook),
            _ => None,
        }
    }
}

/// How plan stages are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One stage per agent, canonical order.
    Sequential,
    /// A single stage holding every task.
    Parallel,
    /// Stages derived from dependency tiers (default).
    #[default]
    Hybrid,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::Hybrid => "hybrid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Some(Self::Sequential),
            "parallel" => Some(Self::Parallel),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }
}

/// A request to create a video and publish it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRequest {
    pub prompt: String,
    #[serde(default)]
    pub mode: ExecutionMode,
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

impl WorkflowRequest {
    pub fn new(prompt: impl Into<String>, mode: ExecutionMode, platforms: Vec<Platform>) -> Self {
        Self {
            prompt: prompt.into(),
            mode,
            platforms,
            parameters: BTreeMap::new(),
        }
    }

    /// Build a request from untyped adapter input (HTTP body, CLI flags).
    pub fn parse(
        prompt: &str,
        mode: Option<&str>,
        platforms: &[String],
        parameters: BTreeMap<String, serde_json::Value>,
    ) -> Result<Self, EngineError> {
        let mode = match mode {
            Some(m) => ExecutionMode::from_str(m)
                .ok_or_else(|| EngineError::InvalidMode(m.to_string()))?,
            None => ExecutionMode::default(),
        };

        let mut parsed = Vec::new();
        for name in platforms {
            let platform = Platform::from_str(name)
                .ok_or_else(|| EngineError::UnsupportedPlatform(name.clone()))?;
            if !parsed.contains(&platform) {
                parsed.push(platform);
            }
        }

        Ok(Self {
            prompt: prompt.to_string(),
            mode,
            platforms: parsed,
            parameters,
        })
    }
}

/// A set of tasks that may run concurrently.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub index: usize,
    pub tasks: Vec<AgentTask>,
}

/// Ordered stages; stage N+1 starts only after every task of stage N resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowPlan {
    pub mode: ExecutionMode,
    pub stages: Vec<Stage>,
}

impl WorkflowPlan {
    pub fn task_count(&self) -> usize {
        self.stages.iter().map(|s| s.tasks.len()).sum()
    }

    pub fn stage_sizes(&self) -> Vec<usize> {
        self.stages.iter().map(|s| s.tasks.len()).collect()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &AgentTask> {
        self.stages.iter().flat_map(|s| s.tasks.iter())
    }

    pub fn task_for(&self, agent_type: AgentType) -> Option<&AgentTask> {
        self.tasks().find(|t| t.agent_type == agent_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
    Partial,
    Cancelled,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Partial => "partial",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "partial" => Some(Self::Partial),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Final status from a set of results: `completed` iff all succeeded,
    /// `failed` iff none did, `partial` otherwise.
    pub fn derive<'a>(results: impl IntoIterator<Item = &'a AgentResult>) -> Self {
        let mut total = 0usize;
        let mut succeeded = 0usize;
        for result in results {
            total += 1;
            if result.is_success() {
                succeeded += 1;
            }
        }
        if total > 0 && succeeded == total {
            Self::Completed
        } else if succeeded == 0 {
            Self::Failed
        } else {
            Self::Partial
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Results of one executed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageResult {
    pub stage_index: usize,
    pub results: Vec<AgentResult>,
}

/// The aggregate outcome of a workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResult {
    pub workflow_id: String,
    pub prompt: String,
    pub mode: ExecutionMode,
    pub platforms: Vec<Platform>,
    pub status: WorkflowStatus,
    pub stage_results: Vec<StageResult>,
    pub output_files: BTreeSet<String>,
    pub errors: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowResult {
    pub fn new(workflow_id: String, request: &WorkflowRequest) -> Self {
        let now = Utc::now();
        Self {
            workflow_id,
            prompt: request.prompt.clone(),
            mode: request.mode,
            platforms: request.platforms.clone(),
            status: WorkflowStatus::Running,
            stage_results: Vec::new(),
            output_files: BTreeSet::new(),
            errors: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn results(&self) -> impl Iterator<Item = &AgentResult> {
        self.stage_results.iter().flat_map(|s| s.results.iter())
    }

    pub fn result_for(&self, agent_type: AgentType) -> Option<&AgentResult> {
        self.results().find(|r| r.agent_type == agent_type)
    }

    /// Append a completed stage, collecting its artifacts and errors.
    pub fn absorb_stage(&mut self, stage: StageResult) {
        for result in &stage.results {
            if result.is_success() {
                collect_output_files(result, &mut self.output_files);
            } else if let Some(ref error) = result.error {
                self.errors
                    .push(format!("{}: {}", result.agent_type.as_str(), error));
            }
        }
        self.stage_results.push(stage);
        self.updated_at = Utc::now();
    }

    pub fn finalize(&mut self, cancelled: bool) {
        self.status = if cancelled {
            WorkflowStatus::Cancelled
        } else {
            WorkflowStatus::derive(self.results())
        };
        self.updated_at = Utc::now();
    }

    pub fn summary(&self) -> WorkflowSummary {
        WorkflowSummary {
            workflow_id: self.workflow_id.clone(),
            prompt: self.prompt.clone(),
            mode: self.mode,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A listing row for stored workflows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSummary {
    pub workflow_id: String,
    pub prompt: String,
    pub mode: ExecutionMode,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// File-shaped outputs: string values under `*_url` keys, and members of an
/// `output_files` array.
fn collect_output_files(result: &AgentResult, files: &mut BTreeSet<String>) {
    for (key, value) in &result.output {
        if key.ends_with("_url") {
            if let Some(url) = value.as_str().filter(|u| is_artifact_ref(u)) {
                files.insert(url.to_string());
            }
        } else if key == "output_files" {
            if let Some(items) = value.as_array() {
                files.extend(
                    items
                        .iter()
                        .filter_map(|v| v.as_str())
                        .filter(|u| is_artifact_ref(u))
                        .map(|u| u.to_string()),
                );
            }
        }
    }
}

fn is_artifact_ref(value: &str) -> bool {
    !value.trim().is_empty() && value != crate::agents::PENDING
}
