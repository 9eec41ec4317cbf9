//! Social platform publishing.
//!
//! Tokens are read from config; there is no OAuth dance here.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::ProviderError;
use crate::config::{AppConfig, SocialPlatformConfig};
use crate::models::Platform;

#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub platform: Platform,
    pub artifact_url: String,
    pub caption: String,
}

/// Publishes a rendered video to one platform and returns the post URL.
#[async_trait]
pub trait SocialPublisher: Send + Sync {
    async fn publish(&self, request: &PublishRequest) -> Result<String, ProviderError>;
}

pub struct HttpSocialPublisher {
    platforms: BTreeMap<Platform, SocialPlatformConfig>,
    client: reqwest::Client,
}

impl HttpSocialPublisher {
    pub fn new(platforms: BTreeMap<Platform, SocialPlatformConfig>) -> Self {
        Self {
            platforms,
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let platforms = config
            .social
            .iter()
            .filter_map(|(name, cfg)| Platform::from_str(name).map(|p| (p, cfg.clone())))
            .collect();
        Self::new(platforms)
    }
}

#[async_trait]
impl SocialPublisher for HttpSocialPublisher {
    async fn publish(&self, request: &PublishRequest) -> Result<String, ProviderError> {
        let platform = request.platform.as_str();
        let cfg = self
            .platforms
            .get(&request.platform)
            .filter(|c| !c.access_token.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::Rejected(format!("no credentials configured for {}", platform))
            })?;

        let url = format!("{}/publish", cfg.base_url.trim_end_matches('/'));
        tracing::info!("[Social] Publishing to {}: {}", platform, url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", cfg.access_token))
            .json(&serde_json::json!({
                "video_url": request.artifact_url,
                "caption": request.caption,
            }))
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transient(format!("Failed to read response body: {}", e)))?;
        if !status.is_success() {
            return Err(ProviderError::from_status(status.as_u16(), &body));
        }

        let json: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Rejected(format!("Failed to parse response JSON: {}", e)))?;

        json.get("post_url")
            .or_else(|| json.get("url"))
            .or_else(|| json.get("permalink"))
            .and_then(|u| u.as_str())
            .filter(|u| !u.is_empty())
            .map(|u| u.to_string())
            .ok_or_else(|| {
                ProviderError::Rejected(format!("{} did not return a post url", platform))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_token_is_rejected() {
        let mut platforms = BTreeMap::new();
        platforms.insert(
            Platform::TikTok,
            SocialPlatformConfig {
                base_url: "http://127.0.0.1:9".to_string(),
                access_token: String::new(),
            },
        );
        let publisher = HttpSocialPublisher::new(platforms);

        let err = publisher
            .publish(&PublishRequest {
                platform: Platform::TikTok,
                artifact_url: "https://cdn/final.mp4".to_string(),
                caption: "hi".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(_)));

        let err = publisher
            .publish(&PublishRequest {
                platform: Platform::YouTube,
                artifact_url: "https://cdn/final.mp4".to_string(),
                caption: "hi".to_string(),
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("youtube"));
    }
}
