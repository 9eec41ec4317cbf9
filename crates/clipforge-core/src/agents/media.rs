//! Media generation agents: video, music, image and voice-over.
//!
//! All four submit a single generation job and report the artifact URL the
//! provider hands back.

use std::sync::Arc;

use async_trait::async_trait;

use super::{provider_failure, Agent, Upstream};
use crate::models::{AgentOutput, AgentResult, AgentTask, AgentType, ErrorKind};
use crate::providers::{Capability, GenerateRequest, ProviderClient};

async fn generate_artifact(
    client: &dyn ProviderClient,
    task: &AgentTask,
    request: GenerateRequest,
    key: &str,
) -> AgentResult {
    let response = match client.generate(&request).await {
        Ok(r) => r,
        Err(e) => return provider_failure(task, e),
    };

    let Some(url) = response.artifact_url.filter(|u| !u.trim().is_empty()) else {
        return AgentResult::failed(
            task,
            ErrorKind::Rejected,
            format!("{} returned no artifact", client.name()),
        );
    };

    let mut output = AgentOutput::new();
    output.insert(key.to_string(), serde_json::json!(url));
    if let Some(thumb) = response.data.get("thumbnail_url").and_then(|t| t.as_str()) {
        output.insert("thumbnail_url".to_string(), serde_json::json!(thumb));
    }
    AgentResult::success(task, output).with_cost(response.cost)
}

fn require_duration(task: &AgentTask) -> Result<f64, String> {
    match task.param_f64("duration_secs") {
        Some(d) if d > 0.0 => Ok(d),
        Some(d) => Err(format!("duration_secs must be positive, got {}", d)),
        None => Err("missing required parameter 'duration_secs'".to_string()),
    }
}

fn require_str<'a>(task: &'a AgentTask, key: &str) -> Result<&'a str, String> {
    task.param_str(key)
        .ok_or_else(|| format!("missing required parameter '{}'", key))
}

// ─── Video ────────────────────────────────────────────────────────────────

pub struct VideoAgent {
    client: Arc<dyn ProviderClient>,
    model: Option<String>,
}

impl VideoAgent {
    pub fn new(client: Arc<dyn ProviderClient>, model: Option<String>) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl Agent for VideoAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Video
    }

    fn provider(&self) -> &str {
        self.client.name()
    }

    fn validate(&self, task: &AgentTask) -> Result<(), String> {
        require_duration(task)?;
        require_str(task, "aspect_ratio")?;
        Ok(())
    }

    async fn process(&self, task: &AgentTask, _upstream: &Upstream) -> AgentResult {
        let request = GenerateRequest::new(Capability::Video, task.input_prompt.clone())
            .with_model(self.model.clone())
            .with_parameters(serde_json::json!({
                "duration_secs": task.param_f64("duration_secs"),
                "aspect_ratio": task.param_str("aspect_ratio"),
            }));
        generate_artifact(self.client.as_ref(), task, request, "video_url").await
    }
}

// ─── Music ────────────────────────────────────────────────────────────────

pub struct MusicAgent {
    client: Arc<dyn ProviderClient>,
    model: Option<String>,
}

impl MusicAgent {
    pub fn new(client: Arc<dyn ProviderClient>, model: Option<String>) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl Agent for MusicAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Music
    }

    fn provider(&self) -> &str {
        self.client.name()
    }

    fn validate(&self, task: &AgentTask) -> Result<(), String> {
        require_duration(task).map(|_| ())
    }

    async fn process(&self, task: &AgentTask, _upstream: &Upstream) -> AgentResult {
        let mood = task.param_str("music_mood").unwrap_or("upbeat");
        let request = GenerateRequest::new(
            Capability::Music,
            format!("{} background track for: {}", mood, task.input_prompt),
        )
        .with_model(self.model.clone())
        .with_parameters(serde_json::json!({
            "duration_secs": task.param_f64("duration_secs"),
        }));
        generate_artifact(self.client.as_ref(), task, request, "music_url").await
    }
}

// ─── Image ────────────────────────────────────────────────────────────────

pub struct ImageAgent {
    client: Arc<dyn ProviderClient>,
    model: Option<String>,
}

impl ImageAgent {
    pub fn new(client: Arc<dyn ProviderClient>, model: Option<String>) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl Agent for ImageAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Image
    }

    fn provider(&self) -> &str {
        self.client.name()
    }

    fn validate(&self, task: &AgentTask) -> Result<(), String> {
        require_str(task, "aspect_ratio").map(|_| ())
    }

    async fn process(&self, task: &AgentTask, _upstream: &Upstream) -> AgentResult {
        let request = GenerateRequest::new(
            Capability::Image,
            format!("Cover image / thumbnail: {}", task.input_prompt),
        )
        .with_model(self.model.clone())
        .with_parameters(serde_json::json!({
            "aspect_ratio": task.param_str("aspect_ratio"),
        }));
        generate_artifact(self.client.as_ref(), task, request, "image_url").await
    }
}

// ─── Voice ────────────────────────────────────────────────────────────────

pub struct VoiceAgent {
    client: Arc<dyn ProviderClient>,
    model: Option<String>,
}

impl VoiceAgent {
    pub fn new(client: Arc<dyn ProviderClient>, model: Option<String>) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl Agent for VoiceAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Voice
    }

    fn provider(&self) -> &str {
        self.client.name()
    }

    fn validate(&self, task: &AgentTask) -> Result<(), String> {
        require_str(task, "voice").map(|_| ())
    }

    async fn process(&self, task: &AgentTask, _upstream: &Upstream) -> AgentResult {
        // Voice runs alongside Content, so it narrates the prompt itself.
        let text = task
            .param_str("narration")
            .unwrap_or(&task.input_prompt)
            .to_string();
        let request = GenerateRequest::new(Capability::Speech, text)
            .with_model(self.model.clone())
            .with_parameters(serde_json::json!({
                "voice": task.param_str("voice"),
            }));
        generate_artifact(self.client.as_ref(), task, request, "voice_url").await
    }
}
