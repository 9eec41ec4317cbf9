//! Integration tests for the clipforge-cli commands.
//!
//! These tests exercise the same code paths as the binary, using in-memory
//! SQLite databases and mock agents for isolation.

use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use clipforge_cli::commands::{self, parse_params};
use clipforge_cli::{Cli, Commands, WorkflowAction};
use clipforge_core::agents::{Agent, Upstream};
use clipforge_core::models::{
    AgentOutput, AgentResult, AgentTask, AgentType, ExecutionMode, WorkflowStatus,
};
use clipforge_core::state::{AppState, AppStateInner};
use clipforge_core::{AppConfig, Database, DispatchPolicy, Orchestrator};

struct EchoAgent(AgentType);

#[async_trait]
impl Agent for EchoAgent {
    fn agent_type(&self) -> AgentType {
        self.0
    }

    fn provider(&self) -> &str {
        "echo"
    }

    async fn process(&self, task: &AgentTask, _upstream: &Upstream) -> AgentResult {
        let mut output = AgentOutput::new();
        output.insert("prompt".to_string(), serde_json::json!(task.input_prompt));
        output.insert(
            format!("{}_url", self.0.as_str()),
            serde_json::json!(format!("https://cdn.test/{}", self.0.as_str())),
        );
        AgentResult::success(task, output)
    }
}

/// Create an in-memory AppState wired to echo agents.
fn test_state() -> AppState {
    let db = Database::open_in_memory().expect("Failed to open in-memory database");
    let agents = AgentType::ALL
        .iter()
        .map(|kind| Arc::new(EchoAgent(*kind)) as Arc<dyn Agent>);
    let orchestrator = Orchestrator::with_agents(agents, DispatchPolicy::default());
    Arc::new(AppStateInner::with_orchestrator(
        db,
        AppConfig::default(),
        orchestrator,
    ))
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_parse_create_command() {
    let cli = Cli::try_parse_from([
        "clipforge",
        "--db",
        ":memory:",
        "create",
        "-p",
        "a cat surfing",
        "--mode",
        "parallel",
        "--platform",
        "tiktok",
        "--platform",
        "youtube",
        "--param",
        "duration_secs=15",
    ])
    .unwrap();

    assert_eq!(cli.db, ":memory:");
    match cli.command {
        Some(Commands::Create {
            prompt,
            mode,
            platforms,
            params,
        }) => {
            assert_eq!(prompt, "a cat surfing");
            assert_eq!(mode.as_deref(), Some("parallel"));
            assert_eq!(platforms, vec!["tiktok", "youtube"]);
            assert_eq!(params, vec!["duration_secs=15"]);
        }
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn test_create_requires_a_platform() {
    assert!(Cli::try_parse_from(["clipforge", "create", "-p", "cats"]).is_err());
}

#[test]
fn test_parse_workflow_list_default_limit() {
    let cli = Cli::try_parse_from(["clipforge", "workflow", "list"]).unwrap();
    match cli.command {
        Some(Commands::Workflow {
            action: WorkflowAction::List { limit },
        }) => assert_eq!(limit, 20),
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn test_parse_params() {
    let params = parse_params(&strings(&[
        "duration_secs=15",
        "aspect_ratio=9:16",
        "voice=\"calm\"",
        "music_mood=lofi beats",
    ]))
    .unwrap();

    assert_eq!(params["duration_secs"], serde_json::json!(15));
    assert_eq!(params["aspect_ratio"], "9:16");
    assert_eq!(params["voice"], "calm");
    assert_eq!(params["music_mood"], "lofi beats");

    assert!(parse_params(&strings(&["no-equals"])).is_err());
    assert!(parse_params(&strings(&["=value"])).is_err());
}

#[test]
fn test_plan_command_layouts() {
    let state = test_state();
    let platforms = strings(&["tiktok"]);

    let hybrid = commands::plan::build(&state, "cats", None, &platforms).unwrap();
    assert_eq!(hybrid.mode, ExecutionMode::Hybrid);
    assert_eq!(hybrid.stage_sizes(), vec![5, 2, 3]);

    let sequential = commands::plan::build(&state, "cats", Some("sequential"), &platforms).unwrap();
    assert_eq!(sequential.stages.len(), 10);

    let err = commands::plan::build(&state, "cats", Some("turbo"), &platforms).unwrap_err();
    assert_eq!(err, "Invalid execution mode: turbo");

    let err = commands::plan::build(&state, "   ", None, &platforms).unwrap_err();
    assert_eq!(err, "Prompt must not be empty");
}

#[tokio::test]
async fn test_create_runs_and_persists() {
    let state = test_state();
    let result = commands::create::execute(
        &state,
        "a cat surfing",
        Some("hybrid"),
        &strings(&["tiktok", "instagram"]),
        &strings(&["duration_secs=15"]),
    )
    .await
    .unwrap();

    assert_eq!(result.status, WorkflowStatus::Completed);
    assert_eq!(result.results().count(), 10);
    assert!(result.output_files.contains("https://cdn.test/video"));

    // The final result is what the store returns
    let stored = state
        .workflow_store
        .get(&result.workflow_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, result);

    commands::workflow::get(&state, &result.workflow_id).await.unwrap();
    commands::workflow::list(&state, 10).await.unwrap();
    commands::agents::list(&state).await.unwrap();

    let stats = state.agent_stats_store.get(AgentType::Social).await.unwrap().unwrap();
    assert_eq!(stats.total_runs, 1);
    assert_eq!(stats.successes, 1);

    commands::workflow::delete(&state, &result.workflow_id).await.unwrap();
    assert!(commands::workflow::get(&state, &result.workflow_id).await.is_err());
}

#[tokio::test]
async fn test_create_rejects_unknown_platform() {
    let state = test_state();
    let err = commands::create::execute(&state, "cats", None, &strings(&["myspace"]), &[])
        .await
        .unwrap_err();
    assert_eq!(err, "Unsupported platform: myspace");
}
