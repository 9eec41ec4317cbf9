//! Orchestrator — routes tasks to agents and applies dispatch policy.
//!
//! For every task:
//!   1. Looks up the agent registered for the task's kind
//!   2. Runs the agent's parameter validation (no retry on failure)
//!   3. Calls `process` under a per-kind timeout
//!   4. Retries transient failures and timeouts up to `max_retries`; a
//!      timeout is not retried for agents that opt out of it
//!   5. Stamps total duration and attempt count on the result
//!
//! The orchestrator holds no per-workflow state, so `dispatch` can be called
//! concurrently for every task in a stage.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::agents::{default_agents, Agent, Upstream};
use crate::config::AppConfig;
use crate::error::EngineError;
use crate::models::{AgentResult, AgentTask, AgentType, ErrorKind};

/// Timeout and retry rules applied to every dispatch.
#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    pub default_timeout: Duration,
    pub timeouts: HashMap<AgentType, Duration>,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl DispatchPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            default_timeout: Duration::from_secs(config.dispatch.timeout_secs),
            timeouts: AgentType::ALL
                .iter()
                .map(|kind| (*kind, config.timeout_for(*kind)))
                .collect(),
            max_retries: config.dispatch.max_retries,
            retry_backoff: Duration::from_millis(config.dispatch.retry_backoff_ms),
        }
    }

    pub fn timeout_for(&self, agent_type: AgentType) -> Duration {
        self.timeouts
            .get(&agent_type)
            .copied()
            .unwrap_or(self.default_timeout)
    }
}

/// Introspection row for a registered agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDescriptor {
    pub agent_type: AgentType,
    pub name: String,
    pub provider: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

pub struct Orchestrator {
    registry: HashMap<AgentType, Arc<dyn Agent>>,
    policy: DispatchPolicy,
}

impl Orchestrator {
    pub fn new(policy: DispatchPolicy) -> Self {
        Self {
            registry: HashMap::new(),
            policy,
        }
    }

    pub fn with_agents<I>(agents: I, policy: DispatchPolicy) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Agent>>,
    {
        let mut orchestrator = Self::new(policy);
        for agent in agents {
            orchestrator.register(agent);
        }
        orchestrator
    }

    /// The ten production agents wired from config.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::with_agents(default_agents(config), DispatchPolicy::from_config(config))
    }

    /// Register an agent under the kind it reports. Replaces any previous
    /// agent of that kind.
    pub fn register(&mut self, agent: Arc<dyn Agent>) -> Option<Arc<dyn Agent>> {
        let kind = agent.agent_type();
        tracing::info!(
            "[Orchestrator] Registered {} (provider: {})",
            kind.display_name(),
            agent.provider()
        );
        self.registry.insert(kind, agent)
    }

    pub fn is_registered(&self, agent_type: AgentType) -> bool {
        self.registry.contains_key(&agent_type)
    }

    /// Registered kinds in canonical order.
    pub fn registered(&self) -> Vec<AgentType> {
        let mut kinds: Vec<_> = self.registry.keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    pub fn describe(&self) -> Vec<AgentDescriptor> {
        self.registered()
            .into_iter()
            .filter_map(|kind| self.registry.get(&kind).map(|agent| (kind, agent)))
            .map(|(kind, agent)| AgentDescriptor {
                agent_type: kind,
                name: kind.display_name().to_string(),
                provider: agent.provider().to_string(),
                timeout_secs: self.policy.timeout_for(kind).as_secs(),
                max_retries: self.policy.max_retries,
            })
            .collect()
    }

    /// Run one task to a final result.
    ///
    /// Only an unregistered kind is an error; every agent-side failure comes
    /// back as a `failed` result.
    pub async fn dispatch(
        &self,
        task: &AgentTask,
        upstream: &Upstream,
    ) -> Result<AgentResult, EngineError> {
        let kind = task.agent_type;
        let agent = self
            .registry
            .get(&kind)
            .cloned()
            .ok_or_else(|| EngineError::UnknownAgentType(kind.as_str().to_string()))?;

        let started = Instant::now();

        if let Err(reason) = agent.validate(task) {
            tracing::warn!("[Orchestrator] {} validation failed: {}", kind, reason);
            let mut result = AgentResult::failed(task, ErrorKind::Validation, reason);
            result.duration_ms = started.elapsed().as_millis() as u64;
            return Ok(result);
        }

        let timeout = self.policy.timeout_for(kind);
        let mut attempts = 0u32;
        let mut result = loop {
            attempts += 1;
            let result = match tokio::time::timeout(timeout, agent.process(task, upstream)).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        "[Orchestrator] {} timed out after {:?} (attempt {})",
                        kind,
                        timeout,
                        attempts
                    );
                    AgentResult::failed(task, ErrorKind::Timeout, "timeout")
                }
            };

            let retry_allowed = result.error_kind != Some(ErrorKind::Timeout)
                || agent.retries_timeouts();
            if result.is_retryable() && retry_allowed && attempts <= self.policy.max_retries {
                tracing::warn!(
                    "[Orchestrator] {} attempt {} failed ({}), retrying",
                    kind,
                    attempts,
                    result.error.as_deref().unwrap_or("unknown error")
                );
                if !self.policy.retry_backoff.is_zero() {
                    tokio::time::sleep(self.policy.retry_backoff).await;
                }
                continue;
            }
            break result;
        };

        // The result always describes the task it was dispatched for.
        result.task_id = task.id.clone();
        result.agent_type = kind;
        result.attempts = attempts;
        result.duration_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            "[Orchestrator] {} finished: {} in {}ms ({} attempt(s))",
            kind,
            result.status.as_str(),
            result.duration_ms,
            attempts
        );
        Ok(result)
    }
}
