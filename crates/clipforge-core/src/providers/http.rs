//! HTTP provider client — calls OpenAI-compatible, Anthropic-compatible and
//! generic media-generation endpoints.

use async_trait::async_trait;

use super::{GenerateRequest, GenerateResponse, ProviderClient, ProviderError};
use crate::config::{ProviderApi, ProviderConfig};

/// Calls one configured provider over HTTP.
pub struct HttpProviderClient {
    name: String,
    config: ProviderConfig,
    client: reqwest::Client,
}

impl HttpProviderClient {
    pub fn new(name: impl Into<String>, config: ProviderConfig) -> Self {
        Self {
            name: name.into(),
            config,
            // The orchestrator owns the per-call deadline; this is a backstop.
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(300))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    fn model_for(&self, request: &GenerateRequest) -> String {
        request
            .model
            .clone()
            .or_else(|| self.config.model.clone())
            .unwrap_or_default()
    }

    async fn send_json(
        &self,
        builder: reqwest::RequestBuilder,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        let response = builder
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| ProviderError::Transient(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(ProviderError::from_status(status.as_u16(), &response_text));
        }

        serde_json::from_str(&response_text)
            .map_err(|e| ProviderError::Rejected(format!("Failed to parse response JSON: {}", e)))
    }

    /// Call the OpenAI-compatible chat completions API.
    ///
    /// POST {base_url}/chat/completions
    /// Headers:
    ///   Authorization: Bearer {api_key}
    async fn call_openai(&self, request: &GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let model = self.model_for(request);

        let mut messages = vec![];
        if let Some(ref system) = request.system_prompt {
            messages.push(serde_json::json!({ "role": "system", "content": system }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": request.prompt }));

        let body = serde_json::json!({
            "model": model,
            "messages": messages,
        });

        tracing::info!("[Provider] {} chat completion: {} (model: {})", self.name, url, model);

        let json = self
            .send_json(
                self.client
                    .post(&url)
                    .header("Authorization", format!("Bearer {}", self.config.api_key)),
                &body,
            )
            .await?;

        let text = json
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string());

        Ok(GenerateResponse {
            text,
            artifact_url: None,
            cost: json.get("cost").and_then(|c| c.as_f64()),
            data: json,
        })
    }

    /// Call the Anthropic-compatible Messages API.
    ///
    /// POST {base_url}/v1/messages
    /// Headers:
    ///   x-api-key: {api_key}
    ///   anthropic-version: 2023-06-01
    async fn call_anthropic(&self, request: &GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let model = self.model_for(request);

        let mut body = serde_json::json!({
            "model": model,
            "max_tokens": 4096,
            "messages": [
                { "role": "user", "content": request.prompt }
            ]
        });
        if let Some(ref system) = request.system_prompt {
            body["system"] = serde_json::Value::String(system.clone());
        }

        tracing::info!("[Provider] {} messages call: {} (model: {})", self.name, url, model);

        let json = self
            .send_json(
                self.client
                    .post(&url)
                    .header("x-api-key", &self.config.api_key)
                    .header("anthropic-version", "2023-06-01"),
                &body,
            )
            .await?;

        let text = json
            .get("content")
            .and_then(|c| c.as_array())
            .and_then(|arr| {
                arr.iter()
                    .filter_map(|block| {
                        if block.get("type").and_then(|t| t.as_str()) == Some("text") {
                            block.get("text").and_then(|t| t.as_str()).map(|s| s.to_string())
                        } else {
                            None
                        }
                    })
                    .reduce(|a, b| format!("{}\n{}", a, b))
            });

        Ok(GenerateResponse {
            text,
            artifact_url: None,
            cost: None,
            data: json,
        })
    }

    /// Submit a media generation job.
    ///
    /// POST {base_url}/{capability}
    /// Body: { model, prompt, parameters }
    /// Reply: { url | output_url | data[0].url, cost? }
    async fn call_media(&self, request: &GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        let url = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            request.capability.as_str()
        );
        let model = self.model_for(request);

        let body = serde_json::json!({
            "model": model,
            "prompt": request.prompt,
            "parameters": request.parameters,
        });

        tracing::info!(
            "[Provider] {} {} generation: {}",
            self.name,
            request.capability.as_str(),
            url
        );

        let json = self
            .send_json(
                self.client
                    .post(&url)
                    .header("Authorization", format!("Bearer {}", self.config.api_key)),
                &body,
            )
            .await?;

        let artifact_url = extract_artifact_url(&json).ok_or_else(|| {
            ProviderError::Rejected(format!(
                "{} response did not include an artifact url",
                self.name
            ))
        })?;

        Ok(GenerateResponse {
            text: None,
            artifact_url: Some(artifact_url),
            cost: json.get("cost").and_then(|c| c.as_f64()),
            data: json,
        })
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        match self.config.api {
            ProviderApi::Openai => self.call_openai(request).await,
            ProviderApi::Anthropic => self.call_anthropic(request).await,
            ProviderApi::Media => self.call_media(request).await,
        }
    }
}

fn extract_artifact_url(json: &serde_json::Value) -> Option<String> {
    json.get("url")
        .or_else(|| json.get("output_url"))
        .or_else(|| {
            json.get("data")
                .and_then(|d| d.as_array())
                .and_then(|arr| arr.first())
                .and_then(|item| item.get("url"))
        })
        .and_then(|u| u.as_str())
        .filter(|u| !u.is_empty())
        .map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_artifact_url_shapes() {
        assert_eq!(
            extract_artifact_url(&serde_json::json!({ "url": "https://a/v.mp4" })).as_deref(),
            Some("https://a/v.mp4")
        );
        assert_eq!(
            extract_artifact_url(&serde_json::json!({ "output_url": "https://a/m.mp3" }))
                .as_deref(),
            Some("https://a/m.mp3")
        );
        assert_eq!(
            extract_artifact_url(&serde_json::json!({ "data": [{ "url": "https://a/i.png" }] }))
                .as_deref(),
            Some("https://a/i.png")
        );
        assert_eq!(extract_artifact_url(&serde_json::json!({ "url": "" })), None);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transient() {
        let client = HttpProviderClient::new(
            "local",
            ProviderConfig {
                api: ProviderApi::Media,
                // Port 9 (discard) on loopback is closed in test environments.
                base_url: "http://127.0.0.1:9".to_string(),
                api_key: String::new(),
                model: None,
            },
        );
        let err = client
            .generate(&GenerateRequest::new(super::super::Capability::Video, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Transient(_)));
    }
}
