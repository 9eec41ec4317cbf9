//! Review agents: engagement prediction and the content-safety gate.

use std::sync::Arc;

use async_trait::async_trait;

use super::{parse_json_reply, provider_failure, Agent, Inputs, Upstream};
use crate::models::{AgentOutput, AgentResult, AgentTask, AgentType, ErrorKind};
use crate::providers::{Capability, GenerateRequest, ProviderClient};

const ANALYTICS_PROMPT: &str = r#"You predict short-form video performance.
Reply with a single JSON object:
{"predicted_engagement": <number between 0 and 1>, "report": "<two or three sentences>"}"#;

pub struct AnalyticsAgent {
    client: Arc<dyn ProviderClient>,
    model: Option<String>,
}

impl AnalyticsAgent {
    pub fn new(client: Arc<dyn ProviderClient>, model: Option<String>) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl Agent for AnalyticsAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Analytics
    }

    fn provider(&self) -> &str {
        self.client.name()
    }

    async fn process(&self, task: &AgentTask, upstream: &Upstream) -> AgentResult {
        let mut inputs = Inputs::new(upstream);
        let final_cut = inputs.take(AgentType::Editing, "final_video_url");
        let metadata = inputs.take_value(AgentType::Optimization, "platform_metadata");

        let prompt = format!(
            "Video idea: {}\nFinal cut: {}\nPlatform metadata: {}",
            task.input_prompt, final_cut, metadata
        );
        let request = GenerateRequest::new(Capability::Text, prompt)
            .with_system_prompt(ANALYTICS_PROMPT)
            .with_model(self.model.clone());

        let response = match self.client.generate(&request).await {
            Ok(r) => r,
            Err(e) => return provider_failure(task, e),
        };
        let text = response.text.as_deref().map(str::trim).unwrap_or_default();
        if text.is_empty() {
            return AgentResult::failed(task, ErrorKind::Rejected, "empty analytics report");
        }

        let parsed = parse_json_reply(text);
        let engagement = parsed
            .as_ref()
            .and_then(|j| j.get("predicted_engagement"))
            .and_then(|e| e.as_f64())
            .map(|e| e.clamp(0.0, 1.0));
        let report = parsed
            .as_ref()
            .and_then(|j| j.get("report"))
            .and_then(|r| r.as_str())
            .unwrap_or(text)
            .to_string();

        let mut output = AgentOutput::new();
        output.insert(
            "predicted_engagement".to_string(),
            engagement.map(|e| serde_json::json!(e)).unwrap_or(serde_json::Value::Null),
        );
        output.insert("report".to_string(), serde_json::json!(report));
        inputs.finish(&mut output);
        AgentResult::success(task, output).with_cost(response.cost)
    }
}

const SAFETY_PROMPT: &str = r#"You are a content-safety reviewer for social video.
Check the material for hate, harassment, sexual content, violence, self-harm,
dangerous acts and misleading claims. Reply with a single JSON object:
{"approved": true|false, "reasons": ["..."]}"#;

/// Moderation gate in front of publishing. A flagged verdict is final.
pub struct SafetyAgent {
    client: Arc<dyn ProviderClient>,
    model: Option<String>,
}

impl SafetyAgent {
    pub fn new(client: Arc<dyn ProviderClient>, model: Option<String>) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl Agent for SafetyAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Safety
    }

    fn provider(&self) -> &str {
        self.client.name()
    }

    async fn process(&self, task: &AgentTask, upstream: &Upstream) -> AgentResult {
        let mut inputs = Inputs::new(upstream);
        let script = inputs.take(AgentType::Content, "script");
        let caption = inputs.take(AgentType::Content, "caption");
        let final_cut = inputs.take(AgentType::Editing, "final_video_url");
        let metadata = inputs.take_value(AgentType::Optimization, "platform_metadata");

        let mut checked = vec!["prompt"];
        if upstream.str(AgentType::Content, "script").is_some() {
            checked.extend(["script", "caption"]);
        }
        if upstream.str(AgentType::Editing, "final_video_url").is_some() {
            checked.push("final_video");
        }
        if upstream.value(AgentType::Optimization, "platform_metadata").is_some() {
            checked.push("platform_metadata");
        }

        let prompt = format!(
            "Prompt: {}\nScript: {}\nCaption: {}\nFinal cut: {}\nPlatform metadata: {}",
            task.input_prompt, script, caption, final_cut, metadata
        );
        let request = GenerateRequest::new(Capability::Moderation, prompt)
            .with_system_prompt(SAFETY_PROMPT)
            .with_model(self.model.clone());

        let response = match self.client.generate(&request).await {
            Ok(r) => r,
            Err(e) => return provider_failure(task, e),
        };

        let verdict = response.text.as_deref().and_then(parse_json_reply);
        let approved = verdict
            .as_ref()
            .and_then(|v| v.get("approved"))
            .and_then(|a| a.as_bool());

        match approved {
            Some(true) => {
                let mut output = AgentOutput::new();
                output.insert("approved".to_string(), serde_json::json!(true));
                output.insert("checked".to_string(), serde_json::json!(checked));
                inputs.finish(&mut output);
                AgentResult::success(task, output).with_cost(response.cost)
            }
            Some(false) => {
                let reasons: Vec<String> = verdict
                    .as_ref()
                    .and_then(|v| v.get("reasons"))
                    .and_then(|r| r.as_array())
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|r| r.as_str().map(|s| s.to_string()))
                            .collect()
                    })
                    .unwrap_or_default();
                tracing::warn!("[Safety] Content flagged: {:?}", reasons);
                let detail = if reasons.is_empty() {
                    "no reason given".to_string()
                } else {
                    reasons.join("; ")
                };
                AgentResult::failed(
                    task,
                    ErrorKind::Rejected,
                    format!("content flagged: {}", detail),
                )
            }
            // An unreadable verdict is never treated as approval.
            None => AgentResult::failed(
                task,
                ErrorKind::Rejected,
                "moderation verdict could not be parsed",
            ),
        }
    }
}
