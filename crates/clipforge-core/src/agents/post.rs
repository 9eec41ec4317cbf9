//! Post-production: assembling the final cut and per-platform metadata.

use std::sync::Arc;

use async_trait::async_trait;

use super::{parse_json_reply, provider_failure, Agent, Inputs, Upstream};
use crate::models::{AgentOutput, AgentResult, AgentTask, AgentType, ErrorKind};
use crate::providers::{Capability, GenerateRequest, ProviderClient};

/// Assembles video, music, voice-over and overlays into the final cut.
pub struct EditingAgent {
    client: Arc<dyn ProviderClient>,
    model: Option<String>,
}

impl EditingAgent {
    pub fn new(client: Arc<dyn ProviderClient>, model: Option<String>) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl Agent for EditingAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Editing
    }

    fn provider(&self) -> &str {
        self.client.name()
    }

    async fn process(&self, task: &AgentTask, upstream: &Upstream) -> AgentResult {
        let mut inputs = Inputs::new(upstream);
        let parameters = serde_json::json!({
            "video_url": inputs.take(AgentType::Video, "video_url"),
            "music_url": inputs.take(AgentType::Music, "music_url"),
            "image_url": inputs.take(AgentType::Image, "image_url"),
            "voice_url": inputs.take(AgentType::Voice, "voice_url"),
            "captions": inputs.take(AgentType::Content, "script"),
            "aspect_ratio": task.param_str("aspect_ratio"),
        });

        let request = GenerateRequest::new(
            Capability::Edit,
            format!("Assemble the final cut for: {}", task.input_prompt),
        )
        .with_model(self.model.clone())
        .with_parameters(parameters);

        let response = match self.client.generate(&request).await {
            Ok(r) => r,
            Err(e) => return provider_failure(task, e),
        };
        let Some(url) = response.artifact_url.filter(|u| !u.trim().is_empty()) else {
            return AgentResult::failed(task, ErrorKind::Rejected, "editor returned no final cut");
        };

        let mut output = AgentOutput::new();
        output.insert("final_video_url".to_string(), serde_json::json!(url));
        inputs.finish(&mut output);
        AgentResult::success(task, output).with_cost(response.cost)
    }
}

const OPTIMIZATION_PROMPT: &str = r##"You tune short-form video metadata per platform.
Reply with a single JSON object keyed by platform name, each value
{"title": "...", "caption": "...", "hashtags": ["#..."]}. No other text."##;

/// Produces title, caption and hashtags tuned for each target platform.
pub struct OptimizationAgent {
    client: Arc<dyn ProviderClient>,
    model: Option<String>,
}

impl OptimizationAgent {
    pub fn new(client: Arc<dyn ProviderClient>, model: Option<String>) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl Agent for OptimizationAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Optimization
    }

    fn provider(&self) -> &str {
        self.client.name()
    }

    fn validate(&self, task: &AgentTask) -> Result<(), String> {
        if task.param_list("platforms").is_empty() {
            return Err("no target platforms".to_string());
        }
        Ok(())
    }

    async fn process(&self, task: &AgentTask, upstream: &Upstream) -> AgentResult {
        let platforms = task.param_list("platforms");
        let mut inputs = Inputs::new(upstream);
        let script = inputs.take(AgentType::Content, "script");
        let caption = inputs.take(AgentType::Content, "caption");
        let hashtags = inputs.take_value(AgentType::Content, "hashtags");
        let video_url = inputs.take(AgentType::Video, "video_url");

        let prompt = format!(
            "Video idea: {}\nScript: {}\nDraft caption: {}\nVideo: {}\nPlatforms: {}",
            task.input_prompt,
            script,
            caption,
            video_url,
            platforms.join(", ")
        );
        let request = GenerateRequest::new(Capability::Text, prompt)
            .with_system_prompt(OPTIMIZATION_PROMPT)
            .with_model(self.model.clone());

        let response = match self.client.generate(&request).await {
            Ok(r) => r,
            Err(e) => return provider_failure(task, e),
        };
        let reply = response
            .text
            .as_deref()
            .and_then(parse_json_reply)
            .unwrap_or_default();

        // Keep exactly the requested platforms; fill gaps from the draft caption.
        let fallback_caption = if caption == super::PENDING {
            task.input_prompt.clone()
        } else {
            caption
        };
        let fallback_hashtags = if hashtags.is_array() {
            hashtags
        } else {
            serde_json::json!([])
        };
        let mut metadata = serde_json::Map::new();
        for platform in &platforms {
            let entry = reply
                .get(platform)
                .filter(|v| v.is_object())
                .cloned()
                .unwrap_or_else(|| {
                    serde_json::json!({
                        "title": crate::providers::truncate(&task.input_prompt, 80),
                        "caption": fallback_caption,
                        "hashtags": fallback_hashtags,
                    })
                });
            metadata.insert(platform.clone(), entry);
        }

        let mut output = AgentOutput::new();
        output.insert(
            "platform_metadata".to_string(),
            serde_json::Value::Object(metadata),
        );
        inputs.finish(&mut output);
        AgentResult::success(task, output).with_cost(response.cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{ok, task, FakeProvider};

    #[tokio::test]
    async fn test_editing_uses_upstream_artifacts() {
        let provider = FakeProvider::artifact("https://cdn/final.mp4");
        let agent = EditingAgent::new(provider.clone(), None);
        let upstream = Upstream::from_results(vec![
            ok(AgentType::Video, serde_json::json!({ "video_url": "https://cdn/v.mp4" })),
            ok(AgentType::Music, serde_json::json!({ "music_url": "https://cdn/m.mp3" })),
            ok(AgentType::Image, serde_json::json!({ "image_url": "https://cdn/i.png" })),
            ok(AgentType::Voice, serde_json::json!({ "voice_url": "https://cdn/vo.mp3" })),
            ok(AgentType::Content, serde_json::json!({ "script": "Meet Whiskers." })),
        ]);
        let t = task(AgentType::Editing, serde_json::json!({ "aspect_ratio": "9:16" }));

        let result = agent.process(&t, &upstream).await;
        assert_eq!(result.output_str("final_video_url"), Some("https://cdn/final.mp4"));
        assert!(result.output.get("draft").is_none());

        let request = provider.last_request().unwrap();
        assert_eq!(request.parameters["video_url"], "https://cdn/v.mp4");
        assert_eq!(request.parameters["captions"], "Meet Whiskers.");
    }

    #[tokio::test]
    async fn test_editing_without_upstream_is_draft() {
        let provider = FakeProvider::artifact("https://cdn/final.mp4");
        let agent = EditingAgent::new(provider.clone(), None);
        let t = task(AgentType::Editing, serde_json::json!({}));

        let result = agent.process(&t, &Upstream::new()).await;
        assert_eq!(result.output["draft"], serde_json::json!(true));
        let request = provider.last_request().unwrap();
        assert_eq!(request.parameters["video_url"], "pending");
    }

    #[tokio::test]
    async fn test_optimization_covers_requested_platforms() {
        let provider = FakeProvider::text(
            r##"{"tiktok": {"title": "Cat surf", "caption": "POV", "hashtags": ["#fyp"]},
                "myspace": {"title": "x"}}"##,
        );
        let agent = OptimizationAgent::new(provider, None);
        let t = task(
            AgentType::Optimization,
            serde_json::json!({ "platforms": ["tiktok", "youtube"] }),
        );
        let upstream = Upstream::from_results(vec![ok(
            AgentType::Content,
            serde_json::json!({ "script": "s", "caption": "Surf cat", "hashtags": ["#cat"] }),
        )]);

        let result = agent.process(&t, &upstream).await;
        let metadata = result.output["platform_metadata"].as_object().unwrap();
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata["tiktok"]["caption"], "POV");
        assert_eq!(metadata["youtube"]["caption"], "Surf cat");
        assert_eq!(metadata["youtube"]["hashtags"], serde_json::json!(["#cat"]));
    }

    #[test]
    fn test_optimization_requires_platforms() {
        let agent = OptimizationAgent::new(FakeProvider::text("{}"), None);
        let err = agent
            .validate(&task(AgentType::Optimization, serde_json::json!({})))
            .unwrap_err();
        assert!(err.contains("platforms"));
    }
}
