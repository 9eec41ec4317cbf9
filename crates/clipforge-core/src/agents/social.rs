use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;

use super::{Agent, Upstream};
use crate::models::{AgentOutput, AgentResult, AgentTask, AgentType, ErrorKind, Platform};
use crate::providers::{ProviderError, PublishRequest, SocialPublisher};

/// Publishes the final cut to every requested platform.
///
/// Only runs once the safety gate has passed; the engine enforces that.
/// Platforms are posted to concurrently. A platform that misses its own
/// deadline is reported in `failed_platforms` instead of failing the task,
/// so posts that did go out are kept.
pub struct SocialAgent {
    publisher: Arc<dyn SocialPublisher>,
    publish_timeout: Option<Duration>,
}

impl SocialAgent {
    pub fn new(publisher: Arc<dyn SocialPublisher>) -> Self {
        Self {
            publisher,
            publish_timeout: None,
        }
    }

    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = Some(timeout);
        self
    }

    async fn publish(&self, request: PublishRequest) -> (Platform, Result<String, ProviderError>) {
        let platform = request.platform;
        let outcome = match self.publish_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.publisher.publish(&request)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ProviderError::Transient(format!(
                    "publishing timed out after {}ms",
                    limit.as_millis()
                ))),
            },
            None => self.publisher.publish(&request).await,
        };
        (platform, outcome)
    }
}

fn caption_for(platform: Platform, upstream: &Upstream, task: &AgentTask) -> String {
    upstream
        .value(AgentType::Optimization, "platform_metadata")
        .and_then(|m| m.get(platform.as_str()))
        .and_then(|m| m.get("caption"))
        .and_then(|c| c.as_str())
        .or_else(|| upstream.str(AgentType::Content, "caption"))
        .unwrap_or(&task.input_prompt)
        .to_string()
}

#[async_trait]
impl Agent for SocialAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Social
    }

    fn provider(&self) -> &str {
        "social"
    }

    /// A timed-out attempt may already have posted somewhere.
    fn retries_timeouts(&self) -> bool {
        false
    }

    fn validate(&self, task: &AgentTask) -> Result<(), String> {
        let platforms = task.param_list("platforms");
        if platforms.is_empty() {
            return Err("no target platforms".to_string());
        }
        for name in &platforms {
            if Platform::from_str(name).is_none() {
                return Err(format!("unsupported platform '{}'", name));
            }
        }
        Ok(())
    }

    async fn process(&self, task: &AgentTask, upstream: &Upstream) -> AgentResult {
        let Some(artifact) = upstream
            .str(AgentType::Editing, "final_video_url")
            .or_else(|| upstream.str(AgentType::Video, "video_url"))
        else {
            return AgentResult::failed(task, ErrorKind::Rejected, "no rendered video to publish");
        };

        let requests: Vec<PublishRequest> = task
            .param_list("platforms")
            .iter()
            .filter_map(|p| Platform::from_str(p))
            .map(|platform| PublishRequest {
                platform,
                artifact_url: artifact.to_string(),
                caption: caption_for(platform, upstream, task),
            })
            .collect();

        let mut published = serde_json::Map::new();
        let mut failures = serde_json::Map::new();
        let mut first_error = None;

        let outcomes = join_all(requests.into_iter().map(|r| self.publish(r))).await;
        for (platform, outcome) in outcomes {
            match outcome {
                Ok(url) => {
                    tracing::info!("[Social] Published to {}: {}", platform.as_str(), url);
                    published.insert(platform.as_str().to_string(), serde_json::json!(url));
                }
                Err(e) => {
                    tracing::warn!("[Social] Publishing to {} failed: {}", platform.as_str(), e);
                    failures.insert(platform.as_str().to_string(), serde_json::json!(e.to_string()));
                    first_error.get_or_insert(e);
                }
            }
        }

        // Nothing went out: fail so a transient outage can be retried without
        // double-posting.
        if published.is_empty() {
            return match first_error {
                Some(e) => AgentResult::failed(task, e.kind(), e.to_string()),
                None => AgentResult::failed(task, ErrorKind::Validation, "no target platforms"),
            };
        }

        let mut output = AgentOutput::new();
        output.insert(
            "published_urls".to_string(),
            serde_json::Value::Object(published),
        );
        if !failures.is_empty() {
            output.insert("failed_platforms".to_string(), serde_json::Value::Object(failures));
        }
        AgentResult::success(task, output)
    }
}
