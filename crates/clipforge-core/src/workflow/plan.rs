//! Plan construction: ten tasks laid out into stages for an execution mode.
//!
//! Hybrid stages are derived from the dependency graph rather than listed by
//! hand. A kind's tier is the longest path to it over `data` and `required`
//! edges:
//!
//! ```text
//! tier 0  content  video  music  image  voice
//! tier 1  editing  optimization
//! tier 2  analytics  safety  social
//! ```
//!
//! `gate` edges (safety → social) never raise a tier. They split a stage into
//! waves instead, see [`waves`].

use std::collections::{BTreeMap, HashMap};

use crate::config::ParameterDefaults;
use crate::models::{
    AgentTask, AgentType, Dependency, ExecutionMode, Stage, WorkflowPlan, WorkflowRequest,
};

/// Hybrid tier of an agent kind.
pub fn tier_of(agent_type: AgentType) -> usize {
    agent_type
        .dependencies()
        .iter()
        .filter(|(_, kind)| kind.is_tiered())
        .map(|(upstream, _)| tier_of(*upstream) + 1)
        .max()
        .unwrap_or(0)
}

/// Request parameters layered over configured defaults, with the target
/// platforms injected.
pub fn task_parameters(
    request: &WorkflowRequest,
    defaults: &ParameterDefaults,
) -> BTreeMap<String, serde_json::Value> {
    let mut params = BTreeMap::new();
    params.insert(
        "duration_secs".to_string(),
        serde_json::json!(defaults.duration_secs),
    );
    params.insert(
        "aspect_ratio".to_string(),
        serde_json::json!(defaults.aspect_ratio),
    );
    params.insert("voice".to_string(), serde_json::json!(defaults.voice));
    for (key, value) in &request.parameters {
        params.insert(key.clone(), value.clone());
    }
    params.insert(
        "platforms".to_string(),
        serde_json::json!(request
            .platforms
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()),
    );
    params
}

/// Build the plan for an already-validated request.
pub fn build_plan(request: &WorkflowRequest, defaults: &ParameterDefaults) -> WorkflowPlan {
    let params = task_parameters(request, defaults);

    // Ids first, so dependencies can reference them.
    let ids: HashMap<AgentType, String> = AgentType::ALL
        .iter()
        .map(|kind| (*kind, uuid::Uuid::new_v4().to_string()))
        .collect();

    let tasks: Vec<AgentTask> = AgentType::ALL
        .iter()
        .map(|kind| {
            let depends_on = kind
                .dependencies()
                .iter()
                // Parallel mode runs everything at once; only the safety gate survives.
                .filter(|(_, dep_kind)| request.mode != ExecutionMode::Parallel || !dep_kind.is_tiered())
                .map(|(upstream, dep_kind)| Dependency {
                    task_id: ids[upstream].clone(),
                    agent_type: *upstream,
                    kind: *dep_kind,
                })
                .collect();
            let mut task = AgentTask::new(*kind, request.prompt.clone(), params.clone(), depends_on);
            task.id = ids[kind].clone();
            task
        })
        .collect();

    let groups: Vec<Vec<AgentTask>> = match request.mode {
        ExecutionMode::Sequential => tasks.into_iter().map(|t| vec![t]).collect(),
        ExecutionMode::Parallel => vec![tasks],
        ExecutionMode::Hybrid => {
            let mut tiers: BTreeMap<usize, Vec<AgentTask>> = BTreeMap::new();
            for task in tasks {
                tiers.entry(tier_of(task.agent_type)).or_default().push(task);
            }
            tiers.into_values().collect()
        }
    };

    WorkflowPlan {
        mode: request.mode,
        stages: groups
            .into_iter()
            .enumerate()
            .map(|(index, tasks)| Stage { index, tasks })
            .collect(),
    }
}

/// Split a stage into waves by its internal hard edges. Every wave may run
/// concurrently; wave N+1 starts after wave N resolved.
pub fn waves(stage: &Stage) -> Vec<Vec<&AgentTask>> {
    let mut wave_of: HashMap<&str, usize> = HashMap::new();
    let mut waves: Vec<Vec<&AgentTask>> = Vec::new();

    // Tasks are in canonical order and edges point backwards, so every
    // in-stage upstream has been placed before its dependent.
    for task in &stage.tasks {
        let wave = task
            .hard_dependencies()
            .filter_map(|d| wave_of.get(d.task_id.as_str()))
            .map(|w| w + 1)
            .max()
            .unwrap_or(0);
        wave_of.insert(task.id.as_str(), wave);
        if waves.len() <= wave {
            waves.resize_with(wave + 1, Vec::new);
        }
        waves[wave].push(task);
    }
    waves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DependencyKind, Platform};

    fn request(mode: ExecutionMode) -> WorkflowRequest {
        WorkflowRequest::new("a cat surfing", mode, vec![Platform::TikTok, Platform::YouTube])
    }

    fn kinds(stage: &Stage) -> Vec<AgentType> {
        stage.tasks.iter().map(|t| t.agent_type).collect()
    }

    #[test]
    fn test_every_mode_plans_ten_tasks() {
        for mode in [ExecutionMode::Sequential, ExecutionMode::Parallel, ExecutionMode::Hybrid] {
            let plan = build_plan(&request(mode), &ParameterDefaults::default());
            assert_eq!(plan.task_count(), 10, "{:?}", mode);
            let mut planned: Vec<_> = plan.tasks().map(|t| t.agent_type).collect();
            planned.sort();
            assert_eq!(planned, AgentType::ALL.to_vec());
        }
    }

    #[test]
    fn test_stage_layouts() {
        let defaults = ParameterDefaults::default();
        let sequential = build_plan(&request(ExecutionMode::Sequential), &defaults);
        assert_eq!(sequential.stage_sizes(), vec![1; 10]);
        let order: Vec<_> = sequential.tasks().map(|t| t.agent_type).collect();
        assert_eq!(order, AgentType::ALL.to_vec());

        let parallel = build_plan(&request(ExecutionMode::Parallel), &defaults);
        assert_eq!(parallel.stage_sizes(), vec![10]);

        let hybrid = build_plan(&request(ExecutionMode::Hybrid), &defaults);
        assert_eq!(hybrid.stage_sizes(), vec![5, 2, 3]);
        assert_eq!(
            kinds(&hybrid.stages[1]),
            vec![AgentType::Editing, AgentType::Optimization]
        );
        assert_eq!(
            kinds(&hybrid.stages[2]),
            vec![AgentType::Analytics, AgentType::Safety, AgentType::Social]
        );
    }

    #[test]
    fn test_dependencies_reference_planned_tasks() {
        let plan = build_plan(&request(ExecutionMode::Hybrid), &ParameterDefaults::default());
        let editing = plan.task_for(AgentType::Editing).unwrap();
        let video = plan.task_for(AgentType::Video).unwrap();
        let dep = editing
            .depends_on
            .iter()
            .find(|d| d.agent_type == AgentType::Video)
            .unwrap();
        assert_eq!(dep.task_id, video.id);
        assert_eq!(dep.kind, DependencyKind::Required);
    }

    #[test]
    fn test_parallel_keeps_only_the_gate() {
        let plan = build_plan(&request(ExecutionMode::Parallel), &ParameterDefaults::default());
        for task in plan.tasks() {
            if task.agent_type == AgentType::Social {
                assert_eq!(task.depends_on.len(), 1);
                assert_eq!(task.depends_on[0].agent_type, AgentType::Safety);
            } else {
                assert!(task.depends_on.is_empty(), "{}", task.agent_type);
            }
        }

        let waves = waves(&plan.stages[0]);
        assert_eq!(waves.len(), 2);
        assert_eq!(waves[0].len(), 9);
        assert_eq!(waves[1][0].agent_type, AgentType::Social);
    }

    #[test]
    fn test_hybrid_final_stage_waves() {
        let plan = build_plan(&request(ExecutionMode::Hybrid), &ParameterDefaults::default());
        let waves = waves(&plan.stages[2]);
        let first: Vec<_> = waves[0].iter().map(|t| t.agent_type).collect();
        assert_eq!(first, vec![AgentType::Analytics, AgentType::Safety]);
        assert_eq!(waves[1][0].agent_type, AgentType::Social);

        // Cross-stage edges never split a stage
        assert_eq!(super::waves(&plan.stages[1]).len(), 1);
    }

    #[test]
    fn test_parameters_merge_defaults_and_platforms() {
        let mut req = request(ExecutionMode::Hybrid);
        req.parameters
            .insert("aspect_ratio".to_string(), serde_json::json!("1:1"));
        req.parameters
            .insert("platforms".to_string(), serde_json::json!(["myspace"]));
        let params = task_parameters(&req, &ParameterDefaults::default());

        assert_eq!(params["aspect_ratio"], "1:1");
        assert_eq!(params["voice"], "narrator");
        assert_eq!(params["duration_secs"], serde_json::json!(30.0));
        assert_eq!(params["platforms"], serde_json::json!(["tiktok", "youtube"]));
    }
}
