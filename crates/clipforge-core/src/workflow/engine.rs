//! WorkflowEngine — turns a request into a plan and drives it to a result.
//!
//! Stages run strictly in order. Inside a stage, tasks are dispatched wave by
//! wave with `join_all`; a task whose hard dependency did not succeed is
//! resolved `skipped` without being dispatched. After each stage the
//! snapshot is published to the tracker, persisted, and per-agent stats are
//! recorded. Persistence failures are logged and never stop a run.
//!
//! Once the final snapshot is in the store, the tracker entry is dropped;
//! readers fall back to the store for finished workflows.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;

use super::plan::{build_plan, waves};
use super::tracker::{CancelFlag, WorkflowTracker};
use crate::agents::Upstream;
use crate::config::ParameterDefaults;
use crate::error::EngineError;
use crate::models::{
    AgentResult, AgentTask, AgentType, ErrorKind, StageResult, WorkflowPlan, WorkflowRequest,
    WorkflowResult,
};
use crate::orchestration::Orchestrator;
use crate::store::{AgentStatsStore, WorkflowStore};

/// A validated, planned workflow that has not started yet.
#[derive(Debug, Clone)]
pub struct PreparedWorkflow {
    pub workflow_id: String,
    pub request: WorkflowRequest,
    pub plan: WorkflowPlan,
    pub cancel: CancelFlag,
    /// The `running` snapshot registered with the tracker; execution builds
    /// on it so `created_at` never moves.
    pub snapshot: WorkflowResult,
}

#[derive(Clone)]
pub struct WorkflowEngine {
    orchestrator: Arc<Orchestrator>,
    defaults: ParameterDefaults,
    tracker: Option<Arc<WorkflowTracker>>,
    workflow_store: Option<WorkflowStore>,
    stats_store: Option<AgentStatsStore>,
}

impl WorkflowEngine {
    pub fn new(orchestrator: Arc<Orchestrator>, defaults: ParameterDefaults) -> Self {
        Self {
            orchestrator,
            defaults,
            tracker: None,
            workflow_store: None,
            stats_store: None,
        }
    }

    pub fn with_tracker(mut self, tracker: Arc<WorkflowTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_workflow_store(mut self, store: WorkflowStore) -> Self {
        self.workflow_store = Some(store);
        self
    }

    pub fn with_stats_store(mut self, store: AgentStatsStore) -> Self {
        self.stats_store = Some(store);
        self
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Validate a request and lay out its stages. No agent is called.
    pub fn plan(&self, request: &WorkflowRequest) -> Result<WorkflowPlan, EngineError> {
        if request.prompt.trim().is_empty() {
            return Err(EngineError::EmptyPrompt);
        }
        if request.platforms.is_empty() {
            return Err(EngineError::NoPlatformsSelected);
        }
        if let Some(missing) = AgentType::ALL
            .iter()
            .find(|kind| !self.orchestrator.is_registered(**kind))
        {
            return Err(EngineError::UnknownAgentType(missing.as_str().to_string()));
        }
        Ok(build_plan(request, &self.defaults))
    }

    /// Plan a request and register it with the tracker as `running`.
    ///
    /// Construction errors surface here, before anything runs.
    pub async fn prepare(&self, request: WorkflowRequest) -> Result<PreparedWorkflow, EngineError> {
        let plan = self.plan(&request)?;
        let workflow_id = uuid::Uuid::new_v4().to_string();
        let snapshot = WorkflowResult::new(workflow_id.clone(), &request);
        let prepared = PreparedWorkflow {
            workflow_id,
            request,
            plan,
            cancel: CancelFlag::new(),
            snapshot,
        };
        if let Some(ref tracker) = self.tracker {
            tracker
                .register(prepared.snapshot.clone(), prepared.cancel.clone())
                .await;
        }
        Ok(prepared)
    }

    pub async fn run(&self, request: WorkflowRequest) -> Result<WorkflowResult, EngineError> {
        let prepared = self.prepare(request).await?;
        Ok(self.execute(prepared).await)
    }

    /// Drive a prepared workflow to completion. Never fails; every task ends
    /// with exactly one result.
    pub async fn execute(&self, prepared: PreparedWorkflow) -> WorkflowResult {
        let PreparedWorkflow {
            request,
            plan,
            cancel,
            snapshot: mut workflow,
            ..
        } = prepared;

        tracing::info!(
            "[WorkflowEngine] Starting {} ({} mode, {} stage(s), platforms: {:?})",
            workflow.workflow_id,
            plan.mode.as_str(),
            plan.stages.len(),
            request.platforms
        );

        // Results by task id, for dependency checks and upstream inputs.
        let mut completed: HashMap<String, AgentResult> = HashMap::new();
        let mut cancelled = false;

        let last_stage = plan.stages.len().saturating_sub(1);
        for (stage_pos, stage) in plan.stages.iter().enumerate() {
            let mut results: Vec<AgentResult> = Vec::with_capacity(stage.tasks.len());
            let stage_waves = waves(stage);
            let last_wave = stage_waves.len().saturating_sub(1);

            for (wave_pos, wave) in stage_waves.into_iter().enumerate() {
                // Before the final wave the flag is sealed, so a cancel that
                // arrives later reports that it had nothing left to stop.
                let stop = if stage_pos == last_stage && wave_pos == last_wave {
                    !cancel.seal()
                } else {
                    cancel.is_cancelled()
                };
                if stop {
                    cancelled = true;
                    for task in wave {
                        let result =
                            AgentResult::skipped(task, ErrorKind::Cancelled, "workflow cancelled");
                        completed.insert(task.id.clone(), result.clone());
                        results.push(result);
                    }
                    continue;
                }

                let mut ready: Vec<(&AgentTask, Upstream)> = Vec::new();
                for task in wave {
                    match failed_hard_dependency(task, &completed) {
                        Some(upstream_kind) => {
                            tracing::info!(
                                "[WorkflowEngine] Skipping {}: dependency {} did not succeed",
                                task.agent_type,
                                upstream_kind
                            );
                            let result = AgentResult::skipped(
                                task,
                                ErrorKind::Dependency,
                                format!("dependency {} did not succeed", upstream_kind),
                            );
                            completed.insert(task.id.clone(), result.clone());
                            results.push(result);
                        }
                        None => ready.push((task, upstream_for(task, &completed))),
                    }
                }

                let outcomes = join_all(
                    ready
                        .iter()
                        .map(|(task, upstream)| self.orchestrator.dispatch(task, upstream)),
                )
                .await;

                for ((task, _), outcome) in ready.iter().zip(outcomes) {
                    let result = match outcome {
                        Ok(result) => result,
                        // Registry membership is checked at plan time; this
                        // only happens if the orchestrator was swapped underneath.
                        Err(e) => AgentResult::failed(task, ErrorKind::Validation, e.to_string()),
                    };
                    completed.insert(task.id.clone(), result.clone());
                    results.push(result);
                }
            }

            // Report in plan order regardless of completion order.
            results.sort_by_key(|r| {
                stage
                    .tasks
                    .iter()
                    .position(|t| t.id == r.task_id)
                    .unwrap_or(usize::MAX)
            });

            tracing::info!(
                "[WorkflowEngine] {} stage {} done: {}/{} succeeded",
                workflow.workflow_id,
                stage.index,
                results.iter().filter(|r| r.is_success()).count(),
                results.len()
            );

            self.record_stats(&results).await;
            workflow.absorb_stage(StageResult {
                stage_index: stage.index,
                results,
            });
            self.checkpoint(&workflow).await;
        }

        workflow.finalize(cancelled);
        let persisted = self.persist(&workflow).await;
        if let Some(ref tracker) = self.tracker {
            if persisted {
                tracker.remove(&workflow.workflow_id).await;
            } else {
                tracker.publish(workflow.clone()).await;
            }
        }

        tracing::info!(
            "[WorkflowEngine] {} finished: {} ({} output file(s), {} error(s))",
            workflow.workflow_id,
            workflow.status.as_str(),
            workflow.output_files.len(),
            workflow.errors.len()
        );
        workflow
    }

    async fn checkpoint(&self, workflow: &WorkflowResult) {
        if let Some(ref tracker) = self.tracker {
            tracker.publish(workflow.clone()).await;
        }
        self.persist(workflow).await;
    }

    /// Save a snapshot to the store. Returns whether it landed there.
    async fn persist(&self, workflow: &WorkflowResult) -> bool {
        let Some(ref store) = self.workflow_store else {
            return false;
        };
        match store.save(workflow).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    "[WorkflowEngine] Failed to persist snapshot of {}: {}",
                    workflow.workflow_id,
                    e
                );
                false
            }
        }
    }

    async fn record_stats(&self, results: &[AgentResult]) {
        let Some(ref stats) = self.stats_store else {
            return;
        };
        for result in results {
            if let Err(e) = stats.record(result).await {
                tracing::warn!(
                    "[WorkflowEngine] Failed to record stats for {}: {}",
                    result.agent_type,
                    e
                );
            }
        }
    }
}

/// First hard dependency that has not resolved successfully.
fn failed_hard_dependency(
    task: &AgentTask,
    completed: &HashMap<String, AgentResult>,
) -> Option<AgentType> {
    task.hard_dependencies()
        .find(|dep| {
            !completed
                .get(&dep.task_id)
                .map(|r| r.is_success())
                .unwrap_or(false)
        })
        .map(|dep| dep.agent_type)
}

/// Resolved results of every kind the task consumes. Parallel plans drop
/// data edges from scheduling, yet a task in a later wave still sees what
/// its upstream kinds produced.
fn upstream_for(task: &AgentTask, completed: &HashMap<String, AgentResult>) -> Upstream {
    let consumes: Vec<AgentType> = task
        .agent_type
        .dependencies()
        .iter()
        .map(|(kind, _)| *kind)
        .collect();
    Upstream::from_results(
        completed
            .values()
            .filter(|r| consumes.contains(&r.agent_type))
            .cloned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{FakeProvider, FakePublisher, ScriptedAgent, Step};
    use crate::agents::{
        Agent, AnalyticsAgent, ContentAgent, EditingAgent, ImageAgent, MusicAgent,
        OptimizationAgent, SafetyAgent, SocialAgent, VideoAgent, VoiceAgent,
    };
    use crate::db::Database;
    use crate::models::{ExecutionMode, Platform, ResultStatus, WorkflowStatus};
    use crate::orchestration::DispatchPolicy;
    use std::time::Duration;

    struct Harness {
        agents: HashMap<AgentType, Arc<ScriptedAgent>>,
        engine: WorkflowEngine,
    }

    fn harness(overrides: Vec<Arc<ScriptedAgent>>) -> Harness {
        let mut agents: HashMap<AgentType, Arc<ScriptedAgent>> = AgentType::ALL
            .iter()
            .map(|k| (*k, ScriptedAgent::ok(*k)))
            .collect();
        for agent in overrides {
            agents.insert(agent.kind, agent);
        }
        let policy = DispatchPolicy {
            default_timeout: Duration::from_secs(2),
            timeouts: HashMap::new(),
            max_retries: 1,
            retry_backoff: Duration::ZERO,
        };
        let orchestrator = Orchestrator::with_agents(
            agents.values().map(|a| a.clone() as Arc<dyn Agent>),
            policy,
        );
        let engine = WorkflowEngine::new(Arc::new(orchestrator), ParameterDefaults::default());
        Harness { agents, engine }
    }

    fn request(mode: ExecutionMode) -> WorkflowRequest {
        WorkflowRequest::new("a cat surfing at sunset", mode, vec![Platform::TikTok])
    }

    fn status_of(workflow: &WorkflowResult, kind: AgentType) -> ResultStatus {
        workflow.result_for(kind).map(|r| r.status).unwrap()
    }

    #[tokio::test]
    async fn test_hybrid_all_success() {
        let h = harness(vec![]);
        let workflow = h.engine.run(request(ExecutionMode::Hybrid)).await.unwrap();

        assert_eq!(workflow.status, WorkflowStatus::Completed);
        assert_eq!(workflow.stage_results.len(), 3);
        assert_eq!(workflow.results().count(), 10);
        assert!(workflow.output_files.contains("https://cdn.test/video.out"));
        assert!(workflow.output_files.contains("https://cdn.test/music.out"));
        assert!(workflow.errors.is_empty());
        for agent in h.agents.values() {
            assert_eq!(agent.calls(), 1);
        }
    }

    #[tokio::test]
    async fn test_editing_receives_declared_upstream() {
        let h = harness(vec![]);
        h.engine.run(request(ExecutionMode::Hybrid)).await.unwrap();
        let seen = h.agents[&AgentType::Editing].seen_upstream.lock().unwrap().clone();
        assert_eq!(
            seen[0],
            vec![
                AgentType::Content,
                AgentType::Video,
                AgentType::Music,
                AgentType::Image,
                AgentType::Voice
            ]
        );
    }

    #[tokio::test]
    async fn test_safety_failure_skips_social_in_every_mode() {
        for mode in [ExecutionMode::Sequential, ExecutionMode::Parallel, ExecutionMode::Hybrid] {
            let h = harness(vec![ScriptedAgent::new(
                AgentType::Safety,
                vec![Step::Fail(ErrorKind::Rejected)],
            )]);
            let workflow = h.engine.run(request(mode)).await.unwrap();

            assert_eq!(status_of(&workflow, AgentType::Safety), ResultStatus::Failed);
            let social = workflow.result_for(AgentType::Social).unwrap();
            assert_eq!(social.status, ResultStatus::Skipped, "{:?}", mode);
            assert_eq!(social.error_kind, Some(ErrorKind::Dependency));
            assert_eq!(h.agents[&AgentType::Social].calls(), 0);
            assert_eq!(workflow.status, WorkflowStatus::Partial);
        }
    }

    #[tokio::test]
    async fn test_required_dependency_failure_skips_editing() {
        let h = harness(vec![ScriptedAgent::new(
            AgentType::Music,
            vec![Step::Fail(ErrorKind::Rejected)],
        )]);
        let workflow = h.engine.run(request(ExecutionMode::Hybrid)).await.unwrap();

        let editing = workflow.result_for(AgentType::Editing).unwrap();
        assert_eq!(editing.status, ResultStatus::Skipped);
        assert_eq!(editing.error.as_deref(), Some("dependency music did not succeed"));
        // Soft dependents still run
        assert_eq!(status_of(&workflow, AgentType::Optimization), ResultStatus::Success);
        assert!(workflow
            .errors
            .contains(&"editing: dependency music did not succeed".to_string()));
    }

    #[tokio::test]
    async fn test_empty_prompt_makes_no_calls() {
        let h = harness(vec![]);
        let mut req = request(ExecutionMode::Hybrid);
        req.prompt = "   ".to_string();
        assert_eq!(h.engine.run(req).await.unwrap_err(), EngineError::EmptyPrompt);

        let mut req = request(ExecutionMode::Hybrid);
        req.platforms.clear();
        assert_eq!(
            h.engine.run(req).await.unwrap_err(),
            EngineError::NoPlatformsSelected
        );
        assert!(h.agents.values().all(|a| a.calls() == 0));
    }

    #[tokio::test]
    async fn test_missing_agent_fails_planning() {
        let orchestrator = Orchestrator::with_agents(
            vec![ScriptedAgent::ok(AgentType::Content) as Arc<dyn Agent>],
            DispatchPolicy::default(),
        );
        let engine = WorkflowEngine::new(Arc::new(orchestrator), ParameterDefaults::default());
        let err = engine.plan(&request(ExecutionMode::Hybrid)).unwrap_err();
        assert_eq!(err, EngineError::UnknownAgentType("video".to_string()));
    }

    #[tokio::test]
    async fn test_all_failed_is_failed() {
        let failing: Vec<_> = AgentType::ALL
            .iter()
            .map(|k| ScriptedAgent::new(*k, vec![Step::Fail(ErrorKind::Rejected)]))
            .collect();
        let h = harness(failing);
        let workflow = h.engine.run(request(ExecutionMode::Sequential)).await.unwrap();
        assert_eq!(workflow.status, WorkflowStatus::Failed);
        assert_eq!(workflow.results().count(), 10);
        assert!(workflow.output_files.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let h = harness(vec![]);
        let prepared = h.engine.prepare(request(ExecutionMode::Hybrid)).await.unwrap();
        prepared.cancel.cancel();
        let workflow = h.engine.execute(prepared).await;

        assert_eq!(workflow.status, WorkflowStatus::Cancelled);
        assert_eq!(workflow.results().count(), 10);
        assert!(workflow
            .results()
            .all(|r| r.error_kind == Some(ErrorKind::Cancelled)));
        assert!(h.agents.values().all(|a| a.calls() == 0));
    }

    #[tokio::test]
    async fn test_cancel_mid_run_lets_inflight_finish() {
        let h = harness(vec![ScriptedAgent::new(
            AgentType::Video,
            vec![Step::Sleep(Duration::from_millis(200))],
        )]);
        let tracker = Arc::new(WorkflowTracker::new());
        let engine = h.engine.clone().with_tracker(tracker.clone());

        let prepared = engine.prepare(request(ExecutionMode::Hybrid)).await.unwrap();
        let id = prepared.workflow_id.clone();
        let run = tokio::spawn({
            let engine = engine.clone();
            async move { engine.execute(prepared).await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(tracker.cancel(&id).await);
        let workflow = run.await.unwrap();

        assert_eq!(workflow.status, WorkflowStatus::Cancelled);
        assert_eq!(workflow.stage_results.len(), 3);
        assert_eq!(status_of(&workflow, AgentType::Video), ResultStatus::Success);
        assert_eq!(status_of(&workflow, AgentType::Editing), ResultStatus::Skipped);
        assert_eq!(h.agents[&AgentType::Social].calls(), 0);
        assert_eq!(tracker.get(&id).await.unwrap(), workflow);
    }

    #[tokio::test]
    async fn test_snapshots_and_stats_are_persisted() {
        let db = Database::open_in_memory().unwrap();
        let store = WorkflowStore::new(db.clone());
        let stats = AgentStatsStore::new(db);
        let h = harness(vec![]);
        let engine = h
            .engine
            .clone()
            .with_workflow_store(store.clone())
            .with_stats_store(stats.clone());

        let workflow = engine.run(request(ExecutionMode::Parallel)).await.unwrap();
        let stored = store.get(&workflow.workflow_id).await.unwrap().unwrap();
        assert_eq!(stored, workflow);

        let rows = stats.list().await.unwrap();
        assert_eq!(rows.len(), 10);
        assert!(rows.iter().all(|r| r.total_runs == 1 && r.successes == 1));
    }

    fn provider_backed_engine(publisher: Arc<FakePublisher>) -> WorkflowEngine {
        let script = FakeProvider::text(
            r##"{"script": "A cat rides a wave.", "caption": "Surf cat", "hashtags": ["#cat"]}"##,
        );
        let agents: Vec<Arc<dyn Agent>> = vec![
            Arc::new(ContentAgent::new(script, None)),
            Arc::new(VideoAgent::new(FakeProvider::artifact("https://cdn.test/video.mp4"), None)),
            Arc::new(MusicAgent::new(FakeProvider::artifact("https://cdn.test/music.mp3"), None)),
            Arc::new(ImageAgent::new(FakeProvider::artifact("https://cdn.test/thumb.png"), None)),
            Arc::new(VoiceAgent::new(FakeProvider::artifact("https://cdn.test/voice.mp3"), None)),
            Arc::new(EditingAgent::new(FakeProvider::artifact("https://cdn.test/final.mp4"), None)),
            Arc::new(OptimizationAgent::new(FakeProvider::text("{}"), None)),
            Arc::new(AnalyticsAgent::new(
                FakeProvider::text(r#"{"predicted_engagement": 0.6, "report": "Good hook."}"#),
                None,
            )),
            Arc::new(SafetyAgent::new(FakeProvider::text(r#"{"approved": true}"#), None)),
            Arc::new(SocialAgent::new(publisher)),
        ];
        let orchestrator = Orchestrator::with_agents(agents, DispatchPolicy::default());
        WorkflowEngine::new(Arc::new(orchestrator), ParameterDefaults::default())
    }

    #[tokio::test]
    async fn test_provider_backed_agents_complete_in_every_mode() {
        for mode in [ExecutionMode::Sequential, ExecutionMode::Parallel, ExecutionMode::Hybrid] {
            let publisher = Arc::new(FakePublisher::default());
            let engine = provider_backed_engine(publisher.clone());
            let workflow = engine.run(request(mode)).await.unwrap();

            assert_eq!(workflow.status, WorkflowStatus::Completed, "{:?}: {:?}", mode, workflow.errors);
            let sent = publisher.published.lock().unwrap();
            assert_eq!(sent.len(), 1);
            // Parallel drafts still publish the real render from the earlier wave
            assert!(sent[0].artifact_url.starts_with("https://cdn.test/"), "{:?}", mode);
        }
    }

    #[tokio::test]
    async fn test_parallel_social_sees_first_wave_outputs() {
        let h = harness(vec![]);
        h.engine.run(request(ExecutionMode::Parallel)).await.unwrap();

        let seen = h.agents[&AgentType::Social].seen_upstream.lock().unwrap().clone();
        assert_eq!(
            seen[0],
            vec![
                AgentType::Video,
                AgentType::Editing,
                AgentType::Optimization,
                AgentType::Safety
            ]
        );
        // First-wave tasks start without upstream data
        let seen = h.agents[&AgentType::Editing].seen_upstream.lock().unwrap().clone();
        assert!(seen[0].is_empty());
    }

    #[tokio::test]
    async fn test_finished_workflow_leaves_tracker_once_persisted() {
        let db = Database::open_in_memory().unwrap();
        let store = WorkflowStore::new(db);
        let tracker = Arc::new(WorkflowTracker::new());
        let h = harness(vec![]);
        let engine = h
            .engine
            .clone()
            .with_tracker(tracker.clone())
            .with_workflow_store(store.clone());

        let workflow = engine.run(request(ExecutionMode::Hybrid)).await.unwrap();
        assert!(tracker.get(&workflow.workflow_id).await.is_none());
        assert!(tracker.list().await.is_empty());
        assert_eq!(store.get(&workflow.workflow_id).await.unwrap().unwrap(), workflow);

        // Without a store the final snapshot stays readable from the tracker
        let engine = h.engine.clone().with_tracker(tracker.clone());
        let workflow = engine.run(request(ExecutionMode::Hybrid)).await.unwrap();
        assert_eq!(tracker.get(&workflow.workflow_id).await.unwrap(), workflow);
    }

    #[tokio::test]
    async fn test_created_at_is_stable_across_snapshots() {
        let tracker = Arc::new(WorkflowTracker::new());
        let h = harness(vec![]);
        let engine = h.engine.clone().with_tracker(tracker.clone());

        let prepared = engine.prepare(request(ExecutionMode::Hybrid)).await.unwrap();
        let registered = tracker.get(&prepared.workflow_id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let workflow = engine.execute(prepared).await;

        assert_eq!(workflow.created_at, registered.created_at);
        assert!(workflow.updated_at > registered.created_at);
    }

    #[tokio::test]
    async fn test_cancel_during_final_wave_is_refused() {
        let h = harness(vec![ScriptedAgent::new(
            AgentType::Social,
            vec![Step::Sleep(Duration::from_millis(300))],
        )]);
        let tracker = Arc::new(WorkflowTracker::new());
        let engine = h.engine.clone().with_tracker(tracker.clone());

        let prepared = engine.prepare(request(ExecutionMode::Hybrid)).await.unwrap();
        let id = prepared.workflow_id.clone();
        let run = tokio::spawn({
            let engine = engine.clone();
            async move { engine.execute(prepared).await }
        });

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!tracker.cancel(&id).await);
        let workflow = run.await.unwrap();
        assert_eq!(workflow.status, WorkflowStatus::Completed);
    }
}
