//! Agents — one per `AgentType`, each wrapping its own provider client.
//!
//! An agent turns an `AgentTask` (plus whatever its declared upstream tasks
//! produced) into exactly one `AgentResult`. Provider failures never escape
//! as errors; they come back as `failed` results classified for the
//! orchestrator's retry policy.

mod content;
mod media;
mod post;
mod review;
mod social;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::AppConfig;
use crate::models::{AgentOutput, AgentResult, AgentTask, AgentType};
use crate::providers::{
    HttpProviderClient, HttpSocialPublisher, ProviderClient, ProviderError, SocialPublisher,
};

pub use content::ContentAgent;
pub use media::{ImageAgent, MusicAgent, VideoAgent, VoiceAgent};
pub use post::{EditingAgent, OptimizationAgent};
pub use review::{AnalyticsAgent, SafetyAgent};
pub use social::SocialAgent;

/// Placeholder substituted for an upstream value that is not available yet.
pub const PENDING: &str = "pending";

#[async_trait]
pub trait Agent: Send + Sync {
    fn agent_type(&self) -> AgentType;

    /// Label of the backing provider, for introspection.
    fn provider(&self) -> &str;

    /// Cheap pre-check of required parameters. Must not do I/O.
    fn validate(&self, _task: &AgentTask) -> Result<(), String> {
        Ok(())
    }

    /// Whether the orchestrator may re-run a call that hit its deadline.
    /// Agents with external side effects opt out.
    fn retries_timeouts(&self) -> bool {
        true
    }

    async fn process(&self, task: &AgentTask, upstream: &Upstream) -> AgentResult;
}

/// Results of the tasks a task declared as dependencies.
#[derive(Debug, Clone, Default)]
pub struct Upstream {
    results: BTreeMap<AgentType, AgentResult>,
}

impl Upstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_results<I: IntoIterator<Item = AgentResult>>(results: I) -> Self {
        Self {
            results: results.into_iter().map(|r| (r.agent_type, r)).collect(),
        }
    }

    pub fn insert(&mut self, result: AgentResult) {
        self.results.insert(result.agent_type, result);
    }

    pub fn get(&self, agent_type: AgentType) -> Option<&AgentResult> {
        self.results.get(&agent_type)
    }

    /// Output value of a successful upstream result.
    pub fn value(&self, agent_type: AgentType, key: &str) -> Option<&serde_json::Value> {
        self.results
            .get(&agent_type)
            .filter(|r| r.is_success())
            .and_then(|r| r.output.get(key))
    }

    pub fn str(&self, agent_type: AgentType, key: &str) -> Option<&str> {
        self.value(agent_type, key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty() && *s != PENDING)
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn kinds(&self) -> Vec<AgentType> {
        self.results.keys().copied().collect()
    }
}

/// Reads upstream values, remembering whether any had to be replaced by
/// the `pending` marker.
pub(crate) struct Inputs<'a> {
    upstream: &'a Upstream,
    draft: bool,
}

impl<'a> Inputs<'a> {
    pub(crate) fn new(upstream: &'a Upstream) -> Self {
        Self {
            upstream,
            draft: false,
        }
    }

    pub(crate) fn take(&mut self, agent_type: AgentType, key: &str) -> String {
        match self.upstream.str(agent_type, key) {
            Some(value) => value.to_string(),
            None => {
                self.draft = true;
                PENDING.to_string()
            }
        }
    }

    pub(crate) fn take_value(&mut self, agent_type: AgentType, key: &str) -> serde_json::Value {
        match self.upstream.value(agent_type, key) {
            Some(value) => value.clone(),
            None => {
                self.draft = true;
                serde_json::Value::String(PENDING.to_string())
            }
        }
    }

    /// Mark the output as a draft if any input was missing.
    pub(crate) fn finish(self, output: &mut AgentOutput) {
        if self.draft {
            output.insert("draft".to_string(), serde_json::Value::Bool(true));
        }
    }
}

pub(crate) fn provider_failure(task: &AgentTask, err: ProviderError) -> AgentResult {
    tracing::warn!(
        "[Agent] {} provider call failed: {}",
        task.agent_type.as_str(),
        err
    );
    AgentResult::failed(task, err.kind(), err.to_string())
}

/// Pull a JSON object out of an LLM reply, tolerating code fences and
/// surrounding prose.
pub(crate) fn parse_json_reply(text: &str) -> Option<serde_json::Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str::<serde_json::Value>(&text[start..=end])
        .ok()
        .filter(|v| v.is_object())
}

/// Stand-in for a provider name with no config entry. Every call is rejected.
struct UnconfiguredProvider {
    name: String,
}

#[async_trait]
impl ProviderClient for UnconfiguredProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        _request: &crate::providers::GenerateRequest,
    ) -> Result<crate::providers::GenerateResponse, ProviderError> {
        Err(ProviderError::Rejected(format!(
            "provider '{}' is not configured",
            self.name
        )))
    }
}

/// Build the ten production agents from config.
///
/// One HTTP client is created per provider name and shared by every agent
/// pointing at it.
pub fn default_agents(config: &AppConfig) -> Vec<Arc<dyn Agent>> {
    let mut clients: BTreeMap<String, Arc<dyn ProviderClient>> = BTreeMap::new();
    let mut client_for = |agent_type: AgentType| -> Arc<dyn ProviderClient> {
        let name = config.provider_name_for(agent_type);
        clients
            .entry(name.clone())
            .or_insert_with(|| -> Arc<dyn ProviderClient> {
                let Some(provider) = config.provider(&name) else {
                    tracing::warn!(
                        "[Agent] No provider named '{}' configured for {}",
                        name,
                        agent_type.as_str()
                    );
                    return Arc::new(UnconfiguredProvider { name: name.clone() });
                };
                Arc::new(HttpProviderClient::new(name.clone(), provider.clone()))
            })
            .clone()
    };

    let model = |agent_type: AgentType| config.model_for(agent_type);
    let publisher: Arc<dyn SocialPublisher> = Arc::new(HttpSocialPublisher::from_config(config));

    vec![
        Arc::new(ContentAgent::new(client_for(AgentType::Content), model(AgentType::Content))),
        Arc::new(VideoAgent::new(client_for(AgentType::Video), model(AgentType::Video))),
        Arc::new(MusicAgent::new(client_for(AgentType::Music), model(AgentType::Music))),
        Arc::new(ImageAgent::new(client_for(AgentType::Image), model(AgentType::Image))),
        Arc::new(VoiceAgent::new(client_for(AgentType::Voice), model(AgentType::Voice))),
        Arc::new(EditingAgent::new(client_for(AgentType::Editing), model(AgentType::Editing))),
        Arc::new(OptimizationAgent::new(
            client_for(AgentType::Optimization),
            model(AgentType::Optimization),
        )),
        Arc::new(AnalyticsAgent::new(
            client_for(AgentType::Analytics),
            model(AgentType::Analytics),
        )),
        Arc::new(SafetyAgent::new(client_for(AgentType::Safety), model(AgentType::Safety))),
        Arc::new(
            SocialAgent::new(publisher)
                .with_publish_timeout(config.timeout_for(AgentType::Social).mul_f64(0.9)),
        ),
    ]
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted provider and publisher fakes shared by agent tests.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::models::ErrorKind;
    use crate::providers::{GenerateRequest, GenerateResponse, PublishRequest};

    /// Replies with a fixed response and records every request.
    pub struct FakeProvider {
        pub reply: Result<GenerateResponse, ProviderError>,
        pub calls: AtomicUsize,
        pub requests: Mutex<Vec<GenerateRequest>>,
    }

    impl FakeProvider {
        pub fn text(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(GenerateResponse {
                    text: Some(text.to_string()),
                    ..Default::default()
                }),
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn artifact(url: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(GenerateResponse {
                    artifact_url: Some(url.to_string()),
                    cost: Some(0.5),
                    ..Default::default()
                }),
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn failing(err: ProviderError) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(err),
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn last_request(&self) -> Option<GenerateRequest> {
            self.requests.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl ProviderClient for FakeProvider {
        fn name(&self) -> &str {
            "fake"
        }

        async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            self.reply.clone()
        }
    }

    #[derive(Default)]
    pub struct FakePublisher {
        pub published: Mutex<Vec<PublishRequest>>,
        pub attempts: Mutex<Vec<crate::models::Platform>>,
        pub fail_on: Option<crate::models::Platform>,
        /// Never answers for this platform.
        pub stall_on: Option<crate::models::Platform>,
    }

    #[async_trait]
    impl SocialPublisher for FakePublisher {
        async fn publish(&self, request: &PublishRequest) -> Result<String, ProviderError> {
            self.attempts.lock().unwrap().push(request.platform);
            if self.stall_on == Some(request.platform) {
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            }
            if self.fail_on == Some(request.platform) {
                return Err(ProviderError::Transient("platform down".to_string()));
            }
            self.published.lock().unwrap().push(request.clone());
            Ok(format!("https://{}.example/post/1", request.platform.as_str()))
        }
    }

    /// What a `ScriptedAgent` does on one call.
    #[derive(Debug, Clone)]
    pub enum Step {
        Succeed,
        Fail(ErrorKind),
        Sleep(std::time::Duration),
    }

    /// Agent whose behaviour is a script of steps; the last step repeats.
    pub struct ScriptedAgent {
        pub kind: AgentType,
        pub steps: Mutex<std::collections::VecDeque<Step>>,
        pub fallback: Step,
        pub invalid: Option<String>,
        pub calls: AtomicUsize,
        pub seen_upstream: Mutex<Vec<Vec<AgentType>>>,
    }

    impl ScriptedAgent {
        pub fn new(kind: AgentType, steps: Vec<Step>) -> Arc<Self> {
            let fallback = steps.last().cloned().unwrap_or(Step::Succeed);
            Arc::new(Self {
                kind,
                steps: Mutex::new(steps.into()),
                fallback,
                invalid: None,
                calls: AtomicUsize::new(0),
                seen_upstream: Mutex::new(Vec::new()),
            })
        }

        pub fn ok(kind: AgentType) -> Arc<Self> {
            Self::new(kind, vec![Step::Succeed])
        }

        pub fn invalid(kind: AgentType, reason: &str) -> Arc<Self> {
            Arc::new(Self {
                kind,
                steps: Mutex::new(Default::default()),
                fallback: Step::Succeed,
                invalid: Some(reason.to_string()),
                calls: AtomicUsize::new(0),
                seen_upstream: Mutex::new(Vec::new()),
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Agent for ScriptedAgent {
        fn agent_type(&self) -> AgentType {
            self.kind
        }

        fn provider(&self) -> &str {
            "scripted"
        }

        fn validate(&self, _task: &AgentTask) -> Result<(), String> {
            match &self.invalid {
                Some(reason) => Err(reason.clone()),
                None => Ok(()),
            }
        }

        async fn process(&self, task: &AgentTask, upstream: &Upstream) -> AgentResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_upstream.lock().unwrap().push(upstream.kinds());
            let step = self
                .steps
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone());
            match step {
                Step::Succeed => {
                    let mut output = AgentOutput::new();
                    output.insert(
                        format!("{}_url", self.kind.as_str()),
                        serde_json::json!(format!("https://cdn.test/{}.out", self.kind.as_str())),
                    );
                    AgentResult::success(task, output)
                }
                Step::Fail(kind) => AgentResult::failed(task, kind, format!("scripted {:?}", kind)),
                Step::Sleep(d) => {
                    tokio::time::sleep(d).await;
                    let mut output = AgentOutput::new();
                    output.insert("late".to_string(), serde_json::json!(true));
                    AgentResult::success(task, output)
                }
            }
        }
    }

    pub fn task(agent_type: AgentType, params: serde_json::Value) -> AgentTask {
        let parameters = params
            .as_object()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        AgentTask::new(agent_type, "a cat surfing at sunset".to_string(), parameters, vec![])
    }

    pub fn ok(agent_type: AgentType, output: serde_json::Value) -> AgentResult {
        let t = task(agent_type, serde_json::json!({}));
        let output = output
            .as_object()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        AgentResult::success(&t, output)
    }
}
