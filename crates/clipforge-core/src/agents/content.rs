use std::sync::Arc;

use async_trait::async_trait;

use super::{parse_json_reply, provider_failure, Agent, Upstream};
use crate::models::{AgentOutput, AgentResult, AgentTask, AgentType, ErrorKind};
use crate::providers::{Capability, GenerateRequest, ProviderClient};

const SYSTEM_PROMPT: &str = r##"You write scripts for short-form social video.
Reply with a single JSON object and nothing else:
{"script": "<voice-over script, under 120 words>",
 "caption": "<one-line caption>",
 "hashtags": ["#tag", "..."]}"##;

/// Writes the script, caption and hashtags every later agent builds on.
pub struct ContentAgent {
    client: Arc<dyn ProviderClient>,
    model: Option<String>,
}

impl ContentAgent {
    pub fn new(client: Arc<dyn ProviderClient>, model: Option<String>) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl Agent for ContentAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Content
    }

    fn provider(&self) -> &str {
        self.client.name()
    }

    async fn process(&self, task: &AgentTask, _upstream: &Upstream) -> AgentResult {
        let mut prompt = format!("Video idea: {}", task.input_prompt);
        let platforms = task.param_list("platforms");
        if !platforms.is_empty() {
            prompt.push_str(&format!("\nTarget platforms: {}", platforms.join(", ")));
        }
        if let Some(duration) = task.param_f64("duration_secs") {
            prompt.push_str(&format!("\nTarget length: {} seconds", duration));
        }

        let request = GenerateRequest::new(Capability::Text, prompt)
            .with_system_prompt(SYSTEM_PROMPT)
            .with_model(self.model.clone());

        let response = match self.client.generate(&request).await {
            Ok(r) => r,
            Err(e) => return provider_failure(task, e),
        };

        let text = match response.text.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => return AgentResult::failed(task, ErrorKind::Rejected, "empty script from provider"),
        };

        let mut output = AgentOutput::new();
        match parse_json_reply(&text) {
            Some(json) => {
                let script = json
                    .get("script")
                    .and_then(|s| s.as_str())
                    .unwrap_or(&text)
                    .to_string();
                let caption = json
                    .get("caption")
                    .and_then(|s| s.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| first_line(&script));
                let hashtags = json
                    .get("hashtags")
                    .filter(|h| h.is_array())
                    .cloned()
                    .unwrap_or_else(|| serde_json::json!([]));
                output.insert("script".to_string(), serde_json::json!(script));
                output.insert("caption".to_string(), serde_json::json!(caption));
                output.insert("hashtags".to_string(), hashtags);
            }
            None => {
                // Plain prose reply: the whole thing is the script.
                output.insert("caption".to_string(), serde_json::json!(first_line(&text)));
                output.insert("script".to_string(), serde_json::json!(text));
                output.insert("hashtags".to_string(), serde_json::json!([]));
            }
        }

        AgentResult::success(task, output).with_cost(response.cost)
    }
}

fn first_line(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default().trim();
    crate::providers::truncate(line, 140)
}
