//! External AI provider and social platform clients.
//!
//! Agents never talk HTTP directly; they go through the two narrow traits
//! defined here so every agent can be exercised against in-process fakes.
//!
//! ```text
//! Agent ──► ProviderClient ──► HttpProviderClient ──► OpenAI / Anthropic / media APIs
//!   │
//!   └────► SocialPublisher ──► HttpSocialPublisher ──► TikTok / Instagram / YouTube / ...
//! ```

pub mod http;
pub mod social;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::ErrorKind;

pub use http::HttpProviderClient;
pub use social::{HttpSocialPublisher, PublishRequest, SocialPublisher};

/// What a provider is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Text,
    Video,
    Music,
    Image,
    Speech,
    Edit,
    Moderation,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Video => "video",
            Self::Music => "music",
            Self::Image => "image",
            Self::Speech => "speech",
            Self::Edit => "edit",
            Self::Moderation => "moderation",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub capability: Capability,
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub model: Option<String>,
    /// Provider-specific knobs (duration, aspect ratio, voice, ...)
    pub parameters: serde_json::Value,
}

impl GenerateRequest {
    pub fn new(capability: Capability, prompt: impl Into<String>) -> Self {
        Self {
            capability,
            prompt: prompt.into(),
            system_prompt: None,
            model: None,
            parameters: serde_json::json!({}),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Text output for LLM-style providers
    pub text: Option<String>,
    /// Artifact reference for media providers
    pub artifact_url: Option<String>,
    /// Raw structured payload
    #[serde(default)]
    pub data: serde_json::Value,
    pub cost: Option<f64>,
}

/// Provider failure, classified for the retry policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Network failure, 5xx, rate limiting. Worth retrying.
    #[error("transient provider error: {0}")]
    Transient(String),

    /// 4xx or content-policy refusal. Authoritative; never retried.
    #[error("provider rejected request: {0}")]
    Rejected(String),
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transient(_) => ErrorKind::Transient,
            Self::Rejected(_) => ErrorKind::Rejected,
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = format!("API returned {}: {}", status, truncate(body, 300));
        match status {
            408 | 425 | 429 | 500..=599 => Self::Transient(message),
            _ => Self::Rejected(message),
        }
    }
}

/// An AI provider backend.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ProviderError>;
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            ProviderError::from_status(503, "busy"),
            ProviderError::Transient(_)
        ));
        assert!(matches!(
            ProviderError::from_status(429, "slow down"),
            ProviderError::Transient(_)
        ));
        assert!(matches!(
            ProviderError::from_status(400, "content_policy_violation"),
            ProviderError::Rejected(_)
        ));
        assert_eq!(
            ProviderError::from_status(401, "bad key").kind(),
            ErrorKind::Rejected
        );
    }
}
